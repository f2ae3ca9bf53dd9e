use std::{net::SocketAddr, sync::Arc};

use log::{debug, info};
use rustls::ServerConfig;
use tokio::{
    io::AsyncWriteExt,
    net::{TcpListener, TcpStream},
    sync::RwLock,
    task::JoinHandle,
};
use tokio_rustls::{LazyConfigAcceptor, server::TlsStream};
use tokio_util::sync::CancellationToken;

use crate::{
    config::Config,
    error::WileedotError,
    renewal::RenewalTimer,
    tls::{
        AcmeManager, CertInfo, CertificateManager, HostPolicy, ManagerOptions,
        cache::create_cert_directory, is_tls_alpn_challenge,
    },
};

/// The installed listener together with its close signal
#[derive(Clone)]
struct ActiveListener {
    listener: Arc<TcpListener>,
    local_addr: SocketAddr,
    tls_config: Arc<ServerConfig>,
    closed: CancellationToken,
}

/// A TCP listener serving TLS with certificates obtained and renewed automatically.
///
/// Accept, close and address queries may be called concurrently. A background
/// timer refreshes the certificate of the primary domain once per renewal
/// period until the listener is dropped or [`TlsListener::stop_renewal`] is
/// called.
///
/// # Example
/// ```no_run
/// use wileedot::{TlsListener, config::Config};
///
/// # async fn run() -> Result<(), wileedot::error::WileedotError> {
/// let config = Config::new("example.com", "./certs").email("admin@example.com");
/// let listener = TlsListener::new(config).await?;
///
/// loop {
///     let incoming = listener.accept().await?;
///     tokio::spawn(async move {
///         if let Ok(Some(_tls)) = incoming.handshake().await {
///             // talk to the client
///         }
///     });
/// }
/// # }
/// ```
pub struct TlsListener<M: CertificateManager = AcmeManager> {
    listener: RwLock<Option<ActiveListener>>,
    manager: Arc<M>,
    domain: String,
    policy: HostPolicy,
    renewal: CancellationToken,
    renewal_task: JoinHandle<()>,
}

impl TlsListener<AcmeManager> {
    /// Create a listener backed by the ACME certificate manager
    pub async fn new(config: Config) -> Result<Self, WileedotError> {
        Self::build(config).await
    }
}

impl<M: CertificateManager> TlsListener<M> {
    /// Create a listener with the given certificate manager implementation
    pub async fn build(mut config: Config) -> Result<Self, WileedotError> {
        config.validate()?;

        let base_listener = config.base_listener.take();
        let (active, manager) = Self::setup(&config, base_listener)
            .await
            .map_err(WileedotError::setup)?;

        info!(
            "TLS listener for {} ready on {}",
            config.domain, active.local_addr
        );

        let policy = config.host_policy();
        let manager = Arc::new(manager);
        let renewal = CancellationToken::new();
        let renewal_task = RenewalTimer::new(
            manager.clone(),
            config.domain.clone(),
            config.renewal_period(),
        )
        .spawn(renewal.clone());

        Ok(Self {
            listener: RwLock::new(Some(active)),
            manager,
            domain: config.domain,
            policy,
            renewal,
            renewal_task,
        })
    }

    async fn setup(
        config: &Config,
        base_listener: Option<TcpListener>,
    ) -> Result<(ActiveListener, M), WileedotError> {
        create_cert_directory(&config.cert_directory)?;

        let manager = M::build(ManagerOptions::from(config))?;
        let tls_config = manager.tls_config();

        let listener = match base_listener {
            Some(listener) => {
                debug!("Wrapping the provided listener with TLS");
                listener
            }
            None => {
                debug!("Binding a new TLS listener on {}", config.bind_address);
                TcpListener::bind(config.bind_address)
                    .await
                    .map_err(|source| WileedotError::FailedToBind {
                        address: config.bind_address.to_string(),
                        source,
                    })?
            }
        };

        let local_addr = listener
            .local_addr()
            .map_err(|source| WileedotError::FailedToBind {
                address: config.bind_address.to_string(),
                source,
            })?;

        let active = ActiveListener {
            listener: Arc::new(listener),
            local_addr,
            tls_config,
            closed: CancellationToken::new(),
        };

        Ok((active, manager))
    }

    /// Wait for the next connection.
    ///
    /// The lock is only held while reading the current listener, not while
    /// waiting. Closing the listener wakes pending accepts with
    /// [`WileedotError::ListenerClosed`].
    pub async fn accept(&self) -> Result<IncomingConnection, WileedotError> {
        let active = self
            .listener
            .read()
            .await
            .clone()
            .ok_or(WileedotError::ListenerClosed)?;

        tokio::select! {
            biased;
            _ = active.closed.cancelled() => Err(WileedotError::ListenerClosed),
            accepted = active.listener.accept() => {
                let (stream, peer_addr) = accepted.map_err(WileedotError::FailedToAcceptConnection)?;
                debug!("Accepted connection from {peer_addr}");

                Ok(IncomingConnection {
                    stream,
                    peer_addr,
                    tls_config: active.tls_config.clone(),
                })
            }
        }
    }

    /// Close the listener.
    ///
    /// Returns `true` if this call closed it and `false` if it was already
    /// closed. The renewal timer keeps running.
    pub async fn close(&self) -> bool {
        let mut guard = self.listener.write().await;
        match guard.take() {
            Some(active) => {
                active.closed.cancel();
                info!("Closed TLS listener on {}", active.local_addr);
                true
            }
            None => false,
        }
    }

    /// The bound address, `None` once closed
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.listener
            .read()
            .await
            .as_ref()
            .map(|active| active.local_addr)
    }

    pub async fn is_closed(&self) -> bool {
        self.listener.read().await.is_none()
    }

    /// Validity window of the certificate currently served for the primary domain
    pub async fn cert_info(&self) -> Result<CertInfo, WileedotError> {
        let key = self.manager.certificate(&self.domain).await?;
        CertInfo::from_certified_key(&key)
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Every name certificates are served for, primary domain first
    pub fn allowed_domains(&self) -> &[String] {
        self.policy.domains()
    }

    pub fn manager(&self) -> &Arc<M> {
        &self.manager
    }

    /// Stop the renewal timer before the listener is dropped
    pub fn stop_renewal(&self) {
        self.renewal.cancel();
    }

    pub fn is_renewal_running(&self) -> bool {
        !self.renewal_task.is_finished()
    }
}

impl<M: CertificateManager> Drop for TlsListener<M> {
    fn drop(&mut self) {
        self.renewal.cancel();
    }
}

/// A TCP connection accepted by a [`TlsListener`] whose TLS handshake has not run yet
#[derive(Debug)]
pub struct IncomingConnection {
    stream: TcpStream,
    peer_addr: SocketAddr,
    tls_config: Arc<ServerConfig>,
}

impl IncomingConnection {
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Perform the TLS handshake.
    ///
    /// Returns `None` when the connection was an ACME TLS-ALPN-01 validation
    /// request, which is answered and closed here.
    pub async fn handshake(self) -> Result<Option<TlsStream<TcpStream>>, WileedotError> {
        let start = LazyConfigAcceptor::new(rustls::server::Acceptor::default(), self.stream)
            .await
            .map_err(WileedotError::Handshake)?;

        let is_challenge = is_tls_alpn_challenge(&start.client_hello());

        let mut stream = start
            .into_stream(self.tls_config)
            .await
            .map_err(WileedotError::Handshake)?;

        if is_challenge {
            debug!("Answered ACME TLS-ALPN-01 challenge from {}", self.peer_addr);
            let _ = stream.shutdown().await;
            return Ok(None);
        }

        Ok(Some(stream))
    }
}
