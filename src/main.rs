//! Application entry point — Interview Copilot.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] from disk (returns default on first run).
//! 3. Create the tokio runtime (multi-thread, 2 workers).
//! 4. Load the candidate profile (a starter profile is written on first run).
//! 5. Pick and open the capture device (loopback preferred).
//! 6. Load the Whisper model — degrades to an explanatory error if missing.
//! 7. Probe LLM providers and build the answer generator.
//! 8. Run the record → transcribe → detect → answer loop until EOF.

use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};

use interview_copilot::{
    audio::{pick_device, AudioChunk, CpalProbe, Recorder},
    config::{AppConfig, AppPaths},
    detect::QuestionDetector,
    llm::{AnswerGenerator, AnswerOutcome, GenOptions, ProviderState, StreamingClient},
    profile::{Profile, ProfileError},
    session::{EventClock, OutputSink, SessionEvent, SessionRegistry, TerminalSink},
    stt::{SpeechEngine, SttError, Transcriber, TranscriptOutcome},
};

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> anyhow::Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("Interview Copilot starting up");

    // 2. Configuration
    let config = AppConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e}); using defaults");
        AppConfig::default()
    });

    // 3. Tokio runtime (2 workers — provider streaming + blocking offload)
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;

    rt.block_on(run(config))
}

// ---------------------------------------------------------------------------
// Session loop
// ---------------------------------------------------------------------------

async fn run(config: AppConfig) -> anyhow::Result<()> {
    let paths = AppPaths::new();

    // 4. Candidate profile
    let profile = Arc::new(load_or_create_profile(&config, &paths)?);
    log::info!(
        "profile loaded: {} ({})",
        profile.persona.name,
        profile.persona.role
    );

    // 5. Capture device — loopback preferred, no device at all is fatal.
    let probe = CpalProbe::new();
    let handle = pick_device(&probe, &config.audio)
        .context("no usable capture device; check audio setup")?;
    log::info!(
        "capture device: {} ({:?}, {} Hz)",
        handle.name,
        handle.kind,
        handle.sample_rate
    );

    let capture = probe.open(&handle)?;
    let recorder = Arc::new(Recorder::new(capture.sample_rate()));

    // Drain cpal chunks into the recorder on a dedicated thread; the recorder
    // discards chunks while its flag is down.
    let (chunk_tx, chunk_rx) = std::sync::mpsc::channel::<AudioChunk>();
    {
        let recorder = Arc::clone(&recorder);
        std::thread::Builder::new()
            .name("audio-ingest".into())
            .spawn(move || {
                while let Ok(chunk) = chunk_rx.recv() {
                    recorder.ingest(&chunk);
                }
            })
            .context("failed to spawn audio-ingest thread")?;
    }
    let _stream_handle = capture.start(chunk_tx)?;

    // 6. STT engine — missing model degrades to an explanatory error so the
    //    app still launches.
    let model_path = paths.models_dir.join(format!("{}.bin", config.stt.model));
    let engine: Arc<dyn SpeechEngine> = match interview_copilot::stt::WhisperEngine::load(
        &model_path,
    ) {
        Ok(engine) => {
            log::info!("Whisper model loaded: {}", model_path.display());
            Arc::new(engine)
        }
        Err(e) => {
            log::warn!(
                "Could not load Whisper model ({}): {e}. Transcription will return an error.",
                model_path.display()
            );
            Arc::new(NoModelEngine {
                path: model_path.display().to_string(),
            })
        }
    };
    let transcriber = Arc::new(Transcriber::new(
        engine,
        config.stt.language.clone(),
        config.audio.silence_rms,
    ));

    let detector = QuestionDetector::new(&config.detector)
        .context("invalid question detector configuration")?;

    // 7. LLM providers
    let client = StreamingClient::connect(&config.llm).await;
    match client.state() {
        ProviderState::Preferred => log::info!("using remote provider"),
        ProviderState::Fallback => log::info!("remote unavailable, using local provider"),
        ProviderState::Unavailable => {
            log::warn!("no LLM provider reachable; canned answers only")
        }
    }
    let generator = AnswerGenerator::new(client, Arc::clone(&profile), GenOptions::from(&config.llm));

    // 8. Session loop
    let registry = SessionRegistry::new(config.session.history_window);
    let session = registry
        .create("live")
        .context("failed to create session")?;
    let clock = EventClock::start();
    let mut sink = TerminalSink::stdout();

    println!("Press Enter to start recording, Enter again to stop (Enter during an answer cancels it). Ctrl+D quits.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        if lines.next_line().await?.is_none() {
            break;
        }
        recorder.start();
        println!("recording... press Enter to stop");
        if lines.next_line().await?.is_none() {
            break;
        }
        let clip = recorder.stop();
        log::debug!("clip: {:.2} s, rms {:.5}", clip.duration_secs(), clip.rms());

        // Whisper inference is CPU-bound; keep it off the runtime workers.
        let transcriber = Arc::clone(&transcriber);
        let outcome = tokio::task::spawn_blocking(move || transcriber.transcribe(&clip))
            .await
            .context("transcription task panicked")?;

        let transcript = match outcome {
            TranscriptOutcome::Silence => {
                println!("(silence)");
                continue;
            }
            TranscriptOutcome::EngineFailed(e) => {
                sink.event(&SessionEvent::Error {
                    message: format!("transcription failed: {e}"),
                    timestamp_ms: clock.now_ms(),
                });
                continue;
            }
            TranscriptOutcome::Transcript(result) => result,
        };

        sink.event(&SessionEvent::Transcript {
            text: transcript.text.clone(),
            language: transcript.language.clone(),
            confidence: transcript.confidence,
            timestamp_ms: clock.now_ms(),
        });

        let detection = detector.classify(&transcript.text);
        if !detection.is_question {
            continue;
        }
        let kind = detection.kind.unwrap_or(interview_copilot::detect::QuestionKind::General);
        sink.event(&SessionEvent::QuestionDetected {
            question: transcript.text.clone(),
            kind: kind.as_str().to_string(),
            confidence: detection.confidence,
            timestamp_ms: clock.now_ms(),
        });

        session.reset_cancel();
        let history = session
            .history
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .pairs();

        // Stream the answer; Enter while streaming cancels at the next token.
        // The future borrows the sink through the token callback, so it lives
        // in its own scope.
        let answer = {
            let answer_fut = generator.answer(
                &transcript.text,
                kind,
                &history,
                session.cancel_flag(),
                |token| sink.token(token),
            );
            tokio::pin!(answer_fut);
            loop {
                tokio::select! {
                    answer = &mut answer_fut => break answer,
                    line = lines.next_line() => {
                        if line?.is_some() {
                            session.cancel_generation();
                        }
                    }
                }
            }
        };
        sink.token_done();

        match &answer.outcome {
            AnswerOutcome::Cancelled => {
                println!("(answer cancelled)");
                continue;
            }
            AnswerOutcome::Failed(e) => {
                sink.event(&SessionEvent::Error {
                    message: format!("generation ended early: {e}"),
                    timestamp_ms: clock.now_ms(),
                });
            }
            AnswerOutcome::Streamed | AnswerOutcome::CannedFallback => {}
        }

        if !answer.text.is_empty() {
            sink.event(&SessionEvent::AnswerGenerated {
                answer: answer.text.clone(),
                confidence: answer.confidence,
                context_used: answer
                    .context_used
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
                timestamp_ms: clock.now_ms(),
            });
            session
                .history
                .lock()
                .unwrap_or_else(|poison| poison.into_inner())
                .push(transcript.text.clone(), answer.text.clone());
            session.record_answer();
        }
    }

    registry
        .destroy("live")
        .context("failed to tear down session")?;
    log::info!("shutting down");
    Ok(())
}

// ---------------------------------------------------------------------------
// Profile bootstrap
// ---------------------------------------------------------------------------

/// Load the configured profile, writing a starter profile on first run.
fn load_or_create_profile(config: &AppConfig, paths: &AppPaths) -> anyhow::Result<Profile> {
    match Profile::load(&config.session.profile) {
        Ok(profile) => Ok(profile),
        Err(ProfileError::NotFound(_)) => {
            let path = paths
                .profiles_dir
                .join(format!("{}.json", config.session.profile));
            let starter = Profile::starter();
            starter
                .save_to(&path)
                .with_context(|| format!("failed to write starter profile to {}", path.display()))?;
            log::warn!(
                "no profile found; starter profile written to {} — edit it with your details",
                path.display()
            );
            Ok(starter)
        }
        Err(e) => Err(e).context("failed to load profile"),
    }
}

// ---------------------------------------------------------------------------
// NoModelEngine — stand-in when the Whisper model file is not present
// ---------------------------------------------------------------------------

struct NoModelEngine {
    path: String,
}

impl SpeechEngine for NoModelEngine {
    fn transcribe(
        &self,
        _audio: &[f32],
        _language_hint: &str,
    ) -> Result<interview_copilot::stt::EngineOutput, SttError> {
        Err(SttError::ModelNotFound(self.path.clone()))
    }
}
