//! Batch orchestration.
//!
//! A [`BatchRunner`] owns everything one run shares between tasks (nonce
//! counters and the results collection) and drives the sender × recipient
//! product through a counting semaphore of `max_concurrency` permits.

use crate::config::{BatchConfig, DispatchMode};
use crate::report;
use crate::traits::{ChainClient, TransferSigner};
use crate::transfer::executor::ExecutorSettings;
use crate::transfer::{TransferExecutor, TransferResult, TransferTask};
use crate::utils::nonce::NonceAllocator;
use crate::utils::retry::{execute_with_retry, FailureClassifier, HeuristicClassifier};
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tokio::time::{sleep, Instant};
use tracing::{error, info, Instrument};

pub struct BatchRunner<C, S>
where
    C: ChainClient + 'static,
    S: TransferSigner<C> + 'static,
{
    config: Arc<BatchConfig>,
    executor: TransferExecutor<C, S>,
    classifier: Arc<dyn FailureClassifier>,
    results: Arc<Mutex<Vec<TransferResult>>>,
}

/// What a spawned task needs; cheap to clone.
struct Worker<C, S>
where
    C: ChainClient + 'static,
    S: TransferSigner<C> + 'static,
{
    config: Arc<BatchConfig>,
    executor: TransferExecutor<C, S>,
    classifier: Arc<dyn FailureClassifier>,
    results: Arc<Mutex<Vec<TransferResult>>>,
}

impl<C, S> BatchRunner<C, S>
where
    C: ChainClient + 'static,
    S: TransferSigner<C> + 'static,
{
    pub fn new(config: BatchConfig, client: Arc<C>, signer: Arc<S>) -> Self {
        let settings = ExecutorSettings {
            min_native_balance: config.min_native_balance,
            confirmation: config.confirmation,
        };
        let executor =
            TransferExecutor::new(client, signer, Arc::new(NonceAllocator::new()), settings);
        Self {
            config: Arc::new(config),
            executor,
            classifier: Arc::new(HeuristicClassifier),
            results: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Replaces the substring heuristic used to decide on retries.
    pub fn with_classifier(mut self, classifier: Arc<dyn FailureClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    pub fn nonces(&self) -> &Arc<NonceAllocator> {
        self.executor.nonces()
    }

    /// Runs every transfer and returns once all of them have finished.
    pub async fn run(&self) -> Vec<TransferResult> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));
        info!(
            "Starting batch: {} sender(s) x {} recipient(s) x {} loop(s), {} in flight max ({:?} dispatch)",
            self.config.senders.len(),
            self.config.recipients.len(),
            self.config.loop_count,
            self.config.max_concurrency,
            self.config.dispatch
        );

        match self.config.dispatch {
            DispatchMode::Pairs => self.run_pairs(&semaphore).await,
            DispatchMode::Rounds => self.run_rounds(&semaphore).await,
        }

        std::mem::take(&mut *self.results.lock().await)
    }

    async fn run_pairs(&self, semaphore: &Arc<Semaphore>) {
        let mut set = JoinSet::new();

        for (sender_index, credential) in self.config.senders.iter().enumerate() {
            for recipient in &self.config.recipients {
                let Ok(permit) = semaphore.clone().acquire_owned().await else {
                    error!("Concurrency gate closed; stopping dispatch");
                    break;
                };
                let worker = self.worker();
                let task = self.task_template(sender_index, credential, recipient);
                let span = tracing::info_span!("pair", sender = sender_index + 1);

                set.spawn(
                    async move {
                        let _permit = permit;
                        let budget = worker.config.task_timeout * worker.config.loop_count as u32;
                        let deadline = Instant::now() + budget;
                        for _ in 0..worker.config.loop_count {
                            let task = TransferTask {
                                amount: worker.config.amount.sample(),
                                ..task.clone()
                            };
                            worker.transfer(task, deadline).await;
                            if !worker.config.delay.is_zero() {
                                sleep(worker.config.delay).await;
                            }
                        }
                    }
                    .instrument(span),
                );
            }
        }

        drain(set).await;
    }

    async fn run_rounds(&self, semaphore: &Arc<Semaphore>) {
        for iteration in 0..self.config.loop_count {
            let mut set = JoinSet::new();

            for (sender_index, credential) in self.config.senders.iter().enumerate() {
                for recipient in &self.config.recipients {
                    let Ok(permit) = semaphore.clone().acquire_owned().await else {
                        error!("Concurrency gate closed; stopping dispatch");
                        break;
                    };
                    let worker = self.worker();
                    let task = TransferTask {
                        amount: self.config.amount.sample(),
                        ..self.task_template(sender_index, credential, recipient)
                    };
                    let span = tracing::info_span!(
                        "round",
                        iteration = iteration + 1,
                        sender = sender_index + 1
                    );

                    set.spawn(
                        async move {
                            let _permit = permit;
                            let deadline = Instant::now() + worker.config.task_timeout;
                            worker.transfer(task, deadline).await;
                        }
                        .instrument(span),
                    );
                }
            }

            drain(set).await;
            info!("Loop completed {}/{}", iteration + 1, self.config.loop_count);

            if iteration + 1 < self.config.loop_count && !self.config.delay.is_zero() {
                sleep(self.config.delay).await;
            }
        }
    }

    fn worker(&self) -> Worker<C, S> {
        Worker {
            config: self.config.clone(),
            executor: self.executor.clone(),
            classifier: self.classifier.clone(),
            results: self.results.clone(),
        }
    }

    fn task_template(
        &self,
        sender_index: usize,
        credential: &crate::security::SecretKey,
        recipient: &str,
    ) -> TransferTask {
        TransferTask {
            credential: credential.clone(),
            sender_index,
            recipient: recipient.to_string(),
            contract: self.config.contract.clone(),
            amount: 0,
            wait_for_confirmation: self.config.wait_for_confirmation,
        }
    }
}

impl<C, S> Worker<C, S>
where
    C: ChainClient + 'static,
    S: TransferSigner<C> + 'static,
{
    async fn transfer(&self, task: TransferTask, deadline: Instant) {
        let executor = &self.executor;
        let result = execute_with_retry(&self.config.retry, &*self.classifier, |_| {
            executor.execute(&task, deadline)
        })
        .await;

        report::log_result(task.sender_index, &result);
        self.results.lock().await.push(result);
    }
}

async fn drain(mut set: JoinSet<()>) {
    while let Some(res) = set.join_next().await {
        if let Err(e) = res {
            error!("A transfer task panicked or failed to join: {:?}", e);
        }
    }
}
