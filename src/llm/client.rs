//! Streaming generation client with cross-provider fallback.
//!
//! [`StreamingClient::connect`] probes the preferred (remote) provider and
//! the fallback (local) provider once, at construction.  Each generation
//! request streams tokens over a bounded channel; the fallback policy is:
//!
//! * error **before** any token was emitted → one transparent retry on the
//!   other provider;
//! * error **after** at least one token → terminal stream error, no switch
//!   (the listener already rendered a partial answer, silently restarting
//!   would duplicate it);
//! * timeout counts as a provider error;
//! * cancellation ends the stream cleanly and is never an error.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::config::LlmConfig;

use super::provider::{
    GenError, GenOptions, LocalProvider, RemoteProvider, StreamItem, TokenProvider,
};

/// Bound on the token channel; generation backpressures when the consumer
/// falls this far behind.
const TOKEN_CHANNEL_CAPACITY: usize = 64;

// ---------------------------------------------------------------------------
// ProviderState
// ---------------------------------------------------------------------------

/// Which backend will serve the next request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderState {
    /// The hosted provider answered its probe; it serves requests first.
    Preferred,
    /// Only the local provider answered its probe.
    Fallback,
    /// Neither provider is reachable.
    Unavailable,
}

// ---------------------------------------------------------------------------
// StreamingClient
// ---------------------------------------------------------------------------

/// Token-streaming generation client over an ordered provider list.
pub struct StreamingClient {
    /// Probe-passing providers, preferred first.
    providers: Vec<Arc<dyn TokenProvider>>,
    state: ProviderState,
}

impl StreamingClient {
    /// Probe both configured providers and keep the ones that respond.
    pub async fn connect(config: &LlmConfig) -> Self {
        let mut providers: Vec<Arc<dyn TokenProvider>> = Vec::new();
        let mut preferred_up = false;

        if let Some(remote) = RemoteProvider::from_config(config) {
            match remote.probe().await {
                Ok(()) => {
                    log::info!("remote provider reachable ({})", config.remote_base_url);
                    providers.push(Arc::new(remote));
                    preferred_up = true;
                }
                Err(err) => log::warn!("remote provider probe failed: {err}"),
            }
        } else {
            log::info!("no API key configured, remote provider disabled");
        }

        let local = LocalProvider::from_config(config);
        match local.probe().await {
            Ok(()) => {
                log::info!("local provider reachable ({})", config.local_base_url);
                providers.push(Arc::new(local));
            }
            Err(err) => log::warn!("local provider probe failed: {err}"),
        }

        let state = if preferred_up {
            ProviderState::Preferred
        } else if !providers.is_empty() {
            ProviderState::Fallback
        } else {
            ProviderState::Unavailable
        };

        Self { providers, state }
    }

    /// Build a client over an explicit provider list (used by tests and by
    /// callers that manage probing themselves).
    pub fn with_providers(providers: Vec<Arc<dyn TokenProvider>>, state: ProviderState) -> Self {
        Self { providers, state }
    }

    /// Which backend serves the next request.
    pub fn state(&self) -> ProviderState {
        self.state
    }

    /// Start a streaming generation request.
    ///
    /// Returns the receiving end of a bounded channel: `Ok(token)` items are
    /// whole decoded strings, an `Err` item is terminal, and the channel
    /// closing without an `Err` is the done marker (including after
    /// cancellation).
    pub fn stream_generate(
        &self,
        prompt: String,
        opts: GenOptions,
        cancel: Arc<AtomicBool>,
    ) -> mpsc::Receiver<StreamItem> {
        let (tx, rx) = mpsc::channel::<StreamItem>(TOKEN_CHANNEL_CAPACITY);
        let providers = self.providers.clone();

        tokio::spawn(async move {
            if providers.is_empty() {
                let _ = tx.send(Err(GenError::NoProvider)).await;
                return;
            }

            let started = std::time::Instant::now();
            let mut first_token_logged = false;
            let mut emitted = 0usize;

            for (attempt, provider) in providers.iter().enumerate() {
                let before = emitted;
                let result = provider
                    .stream_into(&prompt, &opts, &tx, &cancel, &mut emitted)
                    .await;

                if emitted > before && !first_token_logged {
                    first_token_logged = true;
                    log::debug!(
                        "first token from {} after {} ms",
                        provider.name(),
                        started.elapsed().as_millis()
                    );
                }

                match result {
                    Ok(()) => {
                        let secs = started.elapsed().as_secs_f32().max(1e-3);
                        log::info!(
                            "{} streamed {} tokens in {:.2}s ({:.1} tok/s)",
                            provider.name(),
                            emitted,
                            secs,
                            emitted as f32 / secs
                        );
                        return;
                    }
                    Err(_) if cancel.load(Ordering::SeqCst) => {
                        // Cancellation raced with a transport error; the
                        // listener asked us to stop, so end cleanly.
                        return;
                    }
                    Err(err) if emitted == 0 && attempt + 1 < providers.len() => {
                        log::warn!(
                            "{} failed before first token ({err}), switching provider",
                            provider.name()
                        );
                        continue;
                    }
                    Err(err) => {
                        log::error!("{} stream failed: {err}", provider.name());
                        let _ = tx.send(Err(err)).await;
                        return;
                    }
                }
            }
        });

        rx
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    /// Scripted provider: emits `tokens`, then optionally fails.
    struct Scripted {
        name: &'static str,
        tokens: Vec<&'static str>,
        then_error: Option<GenError>,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn ok(name: &'static str, tokens: &[&'static str]) -> Arc<Self> {
            Arc::new(Self {
                name,
                tokens: tokens.to_vec(),
                then_error: None,
                calls: AtomicUsize::new(0),
            })
        }

        fn failing_after(
            name: &'static str,
            tokens: &[&'static str],
            error: GenError,
        ) -> Arc<Self> {
            Arc::new(Self {
                name,
                tokens: tokens.to_vec(),
                then_error: Some(error),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TokenProvider for Scripted {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn probe(&self) -> Result<(), GenError> {
            Ok(())
        }

        async fn stream_into(
            &self,
            _prompt: &str,
            _opts: &GenOptions,
            tx: &mpsc::Sender<StreamItem>,
            cancel: &AtomicBool,
            emitted: &mut usize,
        ) -> Result<(), GenError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            for token in &self.tokens {
                if cancel.load(Ordering::SeqCst) {
                    return Ok(());
                }
                *emitted += 1;
                if tx.send(Ok(token.to_string())).await.is_err() {
                    return Ok(());
                }
            }
            match &self.then_error {
                Some(err) => Err(err.clone()),
                None if self.tokens.is_empty() => Err(GenError::Empty),
                None => Ok(()),
            }
        }
    }

    fn opts() -> GenOptions {
        GenOptions {
            temperature: 0.3,
            max_tokens: 100,
            top_p: 0.9,
        }
    }

    async fn collect(mut rx: mpsc::Receiver<StreamItem>) -> (Vec<String>, Option<GenError>) {
        let mut tokens = Vec::new();
        let mut error = None;
        while let Some(item) = rx.recv().await {
            match item {
                Ok(token) => tokens.push(token),
                Err(err) => {
                    error = Some(err);
                    break;
                }
            }
        }
        (tokens, error)
    }

    #[tokio::test]
    async fn happy_path_streams_all_tokens() {
        let provider = Scripted::ok("remote", &["Hello", ", ", "world"]);
        let client =
            StreamingClient::with_providers(vec![provider.clone()], ProviderState::Preferred);

        let rx = client.stream_generate(
            "prompt".into(),
            opts(),
            Arc::new(AtomicBool::new(false)),
        );
        let (tokens, error) = collect(rx).await;

        assert_eq!(tokens, vec!["Hello", ", ", "world"]);
        assert!(error.is_none());
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn zero_token_failure_falls_back_exactly_once() {
        let first = Scripted::failing_after("remote", &[], GenError::Timeout);
        let second = Scripted::ok("local", &["From", " fallback"]);
        let client = StreamingClient::with_providers(
            vec![first.clone(), second.clone()],
            ProviderState::Preferred,
        );

        let rx = client.stream_generate(
            "prompt".into(),
            opts(),
            Arc::new(AtomicBool::new(false)),
        );
        let (tokens, error) = collect(rx).await;

        assert_eq!(tokens, vec!["From", " fallback"]);
        assert!(error.is_none());
        assert_eq!(first.calls(), 1);
        assert_eq!(second.calls(), 1);
    }

    #[tokio::test]
    async fn both_providers_failing_surfaces_the_error() {
        let first = Scripted::failing_after("remote", &[], GenError::Timeout);
        let second = Scripted::failing_after("local", &[], GenError::Provider("down".into()));
        let client = StreamingClient::with_providers(
            vec![first.clone(), second.clone()],
            ProviderState::Preferred,
        );

        let rx = client.stream_generate(
            "prompt".into(),
            opts(),
            Arc::new(AtomicBool::new(false)),
        );
        let (tokens, error) = collect(rx).await;

        assert!(tokens.is_empty());
        assert_eq!(error, Some(GenError::Provider("down".into())));
        assert_eq!(first.calls(), 1);
        assert_eq!(second.calls(), 1);
    }

    #[tokio::test]
    async fn mid_stream_failure_is_terminal_without_fallback() {
        let first = Scripted::failing_after("remote", &["a", "b", "c"], GenError::Timeout);
        let second = Scripted::ok("local", &["never"]);
        let client = StreamingClient::with_providers(
            vec![first.clone(), second.clone()],
            ProviderState::Preferred,
        );

        let rx = client.stream_generate(
            "prompt".into(),
            opts(),
            Arc::new(AtomicBool::new(false)),
        );
        let (tokens, error) = collect(rx).await;

        assert_eq!(tokens, vec!["a", "b", "c"]);
        assert_eq!(error, Some(GenError::Timeout));
        // The fallback provider must never have been touched.
        assert_eq!(second.calls(), 0);
    }

    #[tokio::test]
    async fn no_providers_yields_no_provider_error() {
        let client = StreamingClient::with_providers(vec![], ProviderState::Unavailable);
        let rx = client.stream_generate(
            "prompt".into(),
            opts(),
            Arc::new(AtomicBool::new(false)),
        );
        let (tokens, error) = collect(rx).await;

        assert!(tokens.is_empty());
        assert_eq!(error, Some(GenError::NoProvider));
    }

    /// Provider that waits for an ack after each token, so the test fully
    /// controls how far the stream has advanced when cancel is set.
    struct Paced {
        tokens: Vec<&'static str>,
        acks: tokio::sync::Mutex<mpsc::Receiver<()>>,
    }

    #[async_trait]
    impl TokenProvider for Paced {
        fn name(&self) -> &'static str {
            "paced"
        }

        async fn probe(&self) -> Result<(), GenError> {
            Ok(())
        }

        async fn stream_into(
            &self,
            _prompt: &str,
            _opts: &GenOptions,
            tx: &mpsc::Sender<StreamItem>,
            cancel: &AtomicBool,
            emitted: &mut usize,
        ) -> Result<(), GenError> {
            let mut acks = self.acks.lock().await;
            for token in &self.tokens {
                if cancel.load(Ordering::SeqCst) {
                    return Ok(());
                }
                *emitted += 1;
                if tx.send(Ok(token.to_string())).await.is_err() {
                    return Ok(());
                }
                if acks.recv().await.is_none() {
                    return Ok(());
                }
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn cancellation_ends_the_stream_cleanly() {
        let (ack_tx, ack_rx) = mpsc::channel::<()>(1);
        let provider = Arc::new(Paced {
            tokens: vec!["t1", "t2", "t3", "t4", "t5", "t6", "t7", "t8"],
            acks: tokio::sync::Mutex::new(ack_rx),
        });
        let client = StreamingClient::with_providers(vec![provider], ProviderState::Preferred);

        let cancel = Arc::new(AtomicBool::new(false));
        let mut rx = client.stream_generate("prompt".into(), opts(), Arc::clone(&cancel));

        // Read k tokens, acking each so the provider advances in lockstep.
        let k = 3;
        for _ in 0..k {
            match rx.recv().await {
                Some(Ok(_)) => ack_tx.send(()).await.expect("ack"),
                other => panic!("expected token, got {other:?}"),
            }
        }
        cancel.store(true, Ordering::SeqCst);

        // Drain the remainder: at most one in-flight token, clean close,
        // never an error.
        let mut extra = 0;
        while let Some(item) = rx.recv().await {
            assert!(item.is_ok(), "cancellation must not produce an error");
            extra += 1;
            let _ = ack_tx.send(()).await;
        }
        assert!(extra <= 1, "got {extra} tokens after cancel");
    }
}
