use std::{sync::Arc, time::Duration};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::{
    error::{AppError, AppResult, ProviderRejection, normalize},
    implementations::{
        environment::{self, AmbientSignals},
        registry::WalletRegistry,
        strategy::{self, ConnectStrategy, Launcher},
    },
    types::{ConnectOutcome, ConnectionStatus, Session, WalletDescriptor},
};

/// Owns the session and drives it through
/// `NoSelection -> Selected -> Connecting -> Connected -> Disconnected | Error`.
///
/// Every selection and connect attempt bumps `Session::attempt`; a suspended
/// operation commits its result only if the counter still matches, so a slow
/// connect to one wallet never lands on a session that moved on.
pub struct ConnectionManager {
    registry: Arc<WalletRegistry>,
    signals: Arc<dyn AmbientSignals>,
    launcher: Arc<dyn Launcher>,
    session: watch::Sender<Session>,
    connect_timeout: Option<Duration>,
}

impl ConnectionManager {
    pub fn new(
        registry: Arc<WalletRegistry>,
        signals: Arc<dyn AmbientSignals>,
        launcher: Arc<dyn Launcher>,
    ) -> Self {
        let (session, _) = watch::channel(Session::default());
        Self {
            registry,
            signals,
            launcher,
            session,
            connect_timeout: None,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn session(&self) -> Session {
        self.session.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.session.subscribe()
    }

    pub fn select_wallet(&self, name: &str) -> AppResult<WalletDescriptor> {
        let descriptor = self
            .registry
            .describe(name)
            .ok_or_else(|| AppError::InvalidInput(format!("unknown wallet: {name}")))?;

        self.session.send_modify(|session| {
            if session.is_connecting() {
                debug!(attempt = session.attempt, "selection invalidates in-flight connect");
            }
            session.active_wallet = Some(descriptor.clone());
            session.status = ConnectionStatus::Selected;
            session.account_id = None;
            session.last_error = None;
            session.attempt += 1;
        });
        info!(wallet = %descriptor.name, "wallet selected");
        Ok(descriptor)
    }

    pub async fn connect(&self) -> AppResult<ConnectOutcome> {
        let (selected, attempt) = self.begin_attempt()?;
        // Readiness is re-polled; the snapshot taken at selection may be stale.
        let wallet = self.registry.describe(&selected.name).unwrap_or(selected);

        let environment = environment::classify(self.signals.as_ref());
        let strategy = strategy::plan(environment, wallet.ready_state.is_ready());
        debug!(%environment, ?strategy, ready = ?wallet.ready_state, "connect strategy");

        if strategy.is_direct() {
            return self.connect_provider(&wallet, attempt, strategy).await;
        }

        let current_url = self.signals.current_url();
        match strategy::redirect_target(strategy, &wallet, &current_url) {
            Some((kind, target)) => {
                self.launcher.open(&target);
                self.commit(attempt, |session| {
                    session.status = ConnectionStatus::Selected;
                });
                Ok(ConnectOutcome::Redirected { kind, target })
            }
            None => {
                let err = AppError::NotInstalled(format!(
                    "{} was not detected. Please install the wallet extension.",
                    wallet.name
                ));
                let response = err.to_error_response();
                self.commit(attempt, |session| {
                    session.status = ConnectionStatus::Selected;
                    session.last_error = Some(response);
                });
                Err(err)
            }
        }
    }

    /// Provider failures still end in `Disconnected` with the account cleared.
    pub async fn disconnect(&self) -> AppResult<()> {
        let (wallet, attempt) = {
            let session = self.session.borrow();
            match (&session.active_wallet, session.status) {
                (Some(wallet), ConnectionStatus::Connected) => (wallet.clone(), session.attempt),
                _ => return Err(AppError::NotConnected),
            }
        };

        let provider = self.registry.provider(&wallet.name)?;
        let result = provider.disconnect().await;
        if let Err(rejection) = &result {
            warn!(wallet = %wallet.name, "provider failed to disconnect: {rejection}");
        }

        let failure = result.as_ref().err().map(normalize);
        let committed = self.commit(attempt, |session| {
            session.status = ConnectionStatus::Disconnected;
            session.account_id = None;
            session.last_error = failure;
        });
        if committed {
            info!(wallet = %wallet.name, "wallet disconnected");
        }

        result.map_err(AppError::from)
    }

    /// Publish a failure observed outside the connect flow. Dropped if the
    /// session moved on since `attempt`.
    pub(crate) fn publish_error(&self, attempt: u64, err: &AppError) {
        let response = err.to_error_response();
        self.commit(attempt, |session| {
            session.last_error = Some(response);
        });
    }

    fn begin_attempt(&self) -> AppResult<(WalletDescriptor, u64)> {
        let mut outcome = Err(AppError::NotSelected);
        self.session.send_if_modified(|session| {
            let Some(wallet) = session.active_wallet.clone() else {
                return false;
            };
            match session.status {
                ConnectionStatus::Connecting => {
                    outcome = Err(AppError::ConnectInProgress);
                    false
                }
                ConnectionStatus::Connected => {
                    outcome = Err(AppError::InvalidInput(format!(
                        "{} is already connected",
                        wallet.name
                    )));
                    false
                }
                _ => {
                    session.attempt += 1;
                    session.status = ConnectionStatus::Connecting;
                    session.last_error = None;
                    outcome = Ok((wallet, session.attempt));
                    true
                }
            }
        });

        if let Err(AppError::NotSelected) = &outcome {
            warn!("connect requested with no wallet selected");
        }
        outcome
    }

    async fn connect_provider(
        &self,
        wallet: &WalletDescriptor,
        attempt: u64,
        strategy: ConnectStrategy,
    ) -> AppResult<ConnectOutcome> {
        let provider = self.registry.provider(&wallet.name)?;
        if strategy == ConnectStrategy::BestEffortConnect {
            debug!(wallet = %wallet.name, "best-effort connect");
        }

        let result = match self.connect_timeout {
            Some(limit) => tokio::time::timeout(limit, provider.connect())
                .await
                .unwrap_or_else(|_| Err(ProviderRejection::timed_out(limit))),
            None => provider.connect().await,
        };

        let committed = self.commit(attempt, |session| match &result {
            Ok(account) => {
                session.status = ConnectionStatus::Connected;
                session.account_id = Some(account.clone());
                session.last_error = None;
            }
            Err(rejection) => {
                session.status = ConnectionStatus::Error;
                session.account_id = None;
                session.last_error = Some(normalize(rejection));
            }
        });

        if !committed {
            debug!(wallet = %wallet.name, attempt, "dropping stale connect result");
            return Ok(ConnectOutcome::Superseded);
        }

        match result {
            Ok(account_id) => {
                info!(wallet = %wallet.name, account = %account_id, "wallet connected");
                Ok(ConnectOutcome::Connected { account_id })
            }
            Err(rejection) => {
                warn!(wallet = %wallet.name, "connect failed: {rejection}");
                // Failures of a blind attempt at a wallet that never reported
                // ready stay opaque.
                if strategy == ConnectStrategy::BestEffortConnect
                    && !wallet.ready_state.is_ready()
                {
                    return Err(AppError::Provider(normalize(&rejection).reason));
                }
                Err(rejection.into())
            }
        }
    }

    /// Apply `update` only while `attempt` is still current.
    fn commit<F>(&self, attempt: u64, update: F) -> bool
    where
        F: FnOnce(&mut Session),
    {
        self.session.send_if_modified(|session| {
            if session.attempt != attempt {
                return false;
            }
            update(session);
            true
        })
    }
}
