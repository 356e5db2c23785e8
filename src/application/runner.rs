use crate::domain::events::ProcessingEvent;
use crate::domain::jobs::{Job, JobState, OutputNamer, ProgressGate};
use crate::domain::subtitles::{synthesize, SubtitleSettings};
use crate::ports::engine::{CaptionStyle, EngineEvent, TranscodeEngine, TranscodeRequest};
use crate::ports::notifier::EventSink;
use crate::ports::storage::{ArtifactError, ArtifactStore};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum JobError {
    #[error("could not prepare subtitles: {0}")]
    Subtitles(#[from] ArtifactError),

    #[error("transcoding failed: {0}")]
    Engine(String),

    #[error("transcoding engine stopped without reporting an outcome")]
    Interrupted,
}

#[derive(Debug, Clone)]
pub struct RunnerSettings {
    pub subtitles: SubtitleSettings,
    /// Public URL prefix finished outputs are served under, e.g. `http://host:3000/processed`
    pub download_base: String,
    pub style: CaptionStyle,
}

impl RunnerSettings {
    pub fn download_url(&self, output_file_name: &str) -> String {
        format!(
            "{}/{}",
            self.download_base.trim_end_matches('/'),
            output_file_name
        )
    }
}

/// Tracking handle for a submitted job.
#[derive(Debug)]
pub struct JobHandle {
    id: Uuid,
    state: watch::Receiver<JobState>,
    task: JoinHandle<JobState>,
}

impl JobHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> JobState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<JobState> {
        self.state.clone()
    }

    /// Wait for the terminal state.
    pub async fn wait(self) -> JobState {
        match self.task.await {
            Ok(state) => state,
            Err(e) => JobState::Failed {
                message: format!("job task ended abnormally: {}", e),
            },
        }
    }
}

/// Runs transcoding jobs one at a time and reports their events to the current session.
pub struct JobRunner<E, S, N> {
    engine: E,
    store: S,
    sessions: Arc<N>,
    settings: RunnerSettings,
    namer: OutputNamer,
    gate: Semaphore,
}

impl<E, S, N> JobRunner<E, S, N>
where
    E: TranscodeEngine + 'static,
    S: ArtifactStore + 'static,
    N: EventSink + 'static,
{
    pub fn new(
        engine: E,
        store: S,
        sessions: Arc<N>,
        settings: RunnerSettings,
    ) -> Self {
        Self {
            engine,
            store,
            sessions,
            settings,
            namer: OutputNamer::new(),
            gate: Semaphore::new(1),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Queue a job for the uploaded video and return immediately.
    ///
    /// Jobs wait behind the admission gate, so at most one engine invocation
    /// runs at a time and their events never interleave.
    pub fn submit(self: &Arc<Self>, video_path: PathBuf, transcript: String) -> JobHandle {
        let id = Uuid::new_v4();
        let (state_tx, state_rx) = watch::channel(JobState::Queued);
        let runner = Arc::clone(self);

        info!(job = %id, source = ?video_path, "job queued");
        let task = tokio::spawn(async move {
            let Ok(_permit) = runner.gate.acquire().await else {
                let state = JobState::Failed {
                    message: "job runner is shut down".to_string(),
                };
                let _ = state_tx.send(state.clone());
                return state;
            };
            runner.run(id, video_path, transcript, &state_tx).await
        });

        JobHandle {
            id,
            state: state_rx,
            task,
        }
    }

    /// Drive one job to a terminal state, then remove its intermediate files.
    pub async fn run(
        &self,
        id: Uuid,
        video_path: PathBuf,
        transcript: String,
        state: &watch::Sender<JobState>,
    ) -> JobState {
        let job = Job::new(
            id,
            video_path,
            transcript,
            self.store.output_dir(),
            self.namer.next_name(),
        );
        info!(job = %job.id, output = %job.output_file_name, "job started");
        let _ = state.send(JobState::Running);

        let outcome = match self.execute(&job).await {
            Ok(()) => {
                let download_url = self.settings.download_url(&job.output_file_name);
                info!(job = %job.id, url = %download_url, "job succeeded");
                self.sessions.emit(ProcessingEvent::complete(download_url.clone()));
                JobState::Succeeded { download_url }
            }
            Err(e) => {
                let message = e.to_string();
                error!(job = %job.id, error = %message, "job failed");
                self.sessions.emit(ProcessingEvent::error(message.clone()));
                JobState::Failed { message }
            }
        };

        let removed = self.store.cleanup(&job.intermediates()).await;
        debug!(job = %job.id, removed, "intermediate files cleaned up");

        let _ = state.send(outcome.clone());
        outcome
    }

    async fn execute(&self, job: &Job) -> Result<(), JobError> {
        let track = synthesize(&job.transcript_text, &self.settings.subtitles);
        self.store
            .write_subtitles(&job.subtitle_path, &track.to_srt())
            .await?;
        debug!(job = %job.id, cues = track.len(), path = ?job.subtitle_path, "subtitles written");

        let request = TranscodeRequest {
            input: job.source_video_path.clone(),
            subtitles: (!track.is_empty()).then(|| job.subtitle_path.clone()),
            output: job.output_path.clone(),
            style: self.settings.style.clone(),
        };

        let mut events = self.engine.start(request);
        let mut progress = ProgressGate::new();
        while let Some(event) = events.next().await {
            match event {
                EngineEvent::Progress(percent) => {
                    if let Some(value) = progress.admit(percent) {
                        self.sessions.emit(ProcessingEvent::progress(value));
                    }
                }
                EngineEvent::Completed => return Ok(()),
                EngineEvent::Failed(message) => return Err(JobError::Engine(message)),
            }
        }
        Err(JobError::Interrupted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::local::events::SessionRegistry;
    use crate::adapters::local::fs::FsAdapter;
    use crate::ports::engine::{EngineEvents, MockTranscodeEngine};
    use crate::ports::notifier::MockEventSink;
    use mockall::predicate::eq;
    use mockall::Sequence;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use tempfile::{tempdir, TempDir};
    use tokio::sync::mpsc::UnboundedReceiver;

    const FOX: &str = "the quick brown fox jumps over the lazy dog";

    struct Fixture {
        _root: TempDir,
        store: FsAdapter,
        sessions: Arc<SessionRegistry>,
    }

    impl Fixture {
        async fn new() -> Self {
            let root = tempdir().unwrap();
            let store = FsAdapter::new(root.path().join("uploads"), root.path().join("processed"));
            store.ensure_layout().await.unwrap();
            Self {
                _root: root,
                store,
                sessions: Arc::new(SessionRegistry::new()),
            }
        }

        fn upload(&self, name: &str) -> PathBuf {
            let path = self.store.upload_dir().join(name);
            std::fs::write(&path, b"source video").unwrap();
            path
        }

        fn runner(
            &self,
            engine: MockTranscodeEngine,
        ) -> Arc<JobRunner<MockTranscodeEngine, FsAdapter, SessionRegistry>> {
            self.runner_with(engine, SubtitleSettings::default())
        }

        fn runner_with(
            &self,
            engine: MockTranscodeEngine,
            subtitles: SubtitleSettings,
        ) -> Arc<JobRunner<MockTranscodeEngine, FsAdapter, SessionRegistry>> {
            let settings = RunnerSettings {
                subtitles,
                download_base: "http://localhost:3000/processed/".to_string(),
                style: CaptionStyle::default(),
            };
            Arc::new(JobRunner::new(
                engine,
                self.store.clone(),
                self.sessions.clone(),
                settings,
            ))
        }
    }

    /// Engine that writes the output file and replays `events`.
    fn scripted_engine(events: Vec<EngineEvent>) -> MockTranscodeEngine {
        let mut engine = MockTranscodeEngine::new();
        engine.expect_start().times(1).return_once(move |request| {
            std::fs::write(&request.output, b"burned video").unwrap();
            EngineEvents::from_events(events)
        });
        engine
    }

    fn drain(rx: &mut UnboundedReceiver<ProcessingEvent>) -> Vec<ProcessingEvent> {
        let mut seen = Vec::new();
        while let Ok(event) = rx.try_recv() {
            seen.push(event);
        }
        seen
    }

    fn output_path_of(state: &JobState, store: &FsAdapter) -> PathBuf {
        match state {
            JobState::Succeeded { download_url } => {
                store.output_path(download_url.rsplit('/').next().unwrap())
            }
            other => panic!("expected success, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_successful_job_forwards_monotonic_progress_and_cleans_up() {
        let fixture = Fixture::new().await;
        let (_session, mut rx) = fixture.sessions.register();
        let video = fixture.upload("clip.mp4");

        let mut engine = MockTranscodeEngine::new();
        engine.expect_start().times(1).return_once(|request| {
            let subtitles = request.subtitles.clone().expect("subtitles should be burned");
            assert_eq!(subtitles.file_name().unwrap(), "clip.mp4.srt");
            let srt = std::fs::read_to_string(&subtitles).unwrap();
            assert!(srt.starts_with("1\n00:00:00,000 --> 00:00:03,000\nthe quick brown fox jumps\n"));
            assert_eq!(request.style, CaptionStyle::default());
            std::fs::write(&request.output, b"burned video").unwrap();
            EngineEvents::from_events([
                EngineEvent::Progress(10.0),
                EngineEvent::Progress(45.0),
                EngineEvent::Progress(45.0),
                EngineEvent::Progress(80.0),
                EngineEvent::Progress(100.0),
                EngineEvent::Completed,
            ])
        });

        let handle = fixture.runner(engine).submit(video.clone(), FOX.to_string());
        let state = handle.wait().await;

        let output = output_path_of(&state, &fixture.store);
        let JobState::Succeeded { download_url } = &state else { unreachable!() };
        assert!(download_url.starts_with("http://localhost:3000/processed/processed-"));
        assert!(download_url.ends_with(".mp4"));

        assert_eq!(
            drain(&mut rx),
            vec![
                ProcessingEvent::progress(10),
                ProcessingEvent::progress(45),
                ProcessingEvent::progress(80),
                ProcessingEvent::progress(100),
                ProcessingEvent::complete(download_url.clone()),
            ]
        );
        assert!(!video.exists());
        assert!(!fixture.store.upload_dir().join("clip.mp4.srt").exists());
        assert!(output.exists());
    }

    #[tokio::test]
    async fn test_engine_failure_reports_error_and_cleans_up() {
        let fixture = Fixture::new().await;
        let (_session, mut rx) = fixture.sessions.register();
        let video = fixture.upload("clip.mp4");
        let engine = scripted_engine(vec![
            EngineEvent::Progress(30.0),
            EngineEvent::Failed("Invalid data found when processing input".into()),
        ]);

        let state = fixture.runner(engine).submit(video.clone(), FOX.to_string()).wait().await;

        let message = "transcoding failed: Invalid data found when processing input".to_string();
        assert_eq!(state, JobState::Failed { message: message.clone() });
        assert_eq!(
            drain(&mut rx),
            vec![ProcessingEvent::progress(30), ProcessingEvent::error(message)]
        );
        assert!(!video.exists());
        assert!(!fixture.store.upload_dir().join("clip.mp4.srt").exists());
    }

    #[tokio::test]
    async fn test_partial_output_is_kept_after_failure() {
        let fixture = Fixture::new().await;
        let video = fixture.upload("clip.mp4");
        let engine = scripted_engine(vec![EngineEvent::Failed("killed".into())]);

        let runner = fixture.runner(engine);
        let state = runner.submit(video, FOX.to_string()).wait().await;

        assert!(matches!(state, JobState::Failed { .. }));
        let leftovers: Vec<_> = std::fs::read_dir(fixture.store.output_dir()).unwrap().collect();
        assert_eq!(leftovers.len(), 1);
    }

    #[tokio::test]
    async fn test_completion_without_session_is_dropped_silently() {
        let fixture = Fixture::new().await;
        let video = fixture.upload("clip.mp4");
        let engine = scripted_engine(vec![EngineEvent::Progress(50.0), EngineEvent::Completed]);

        let state = fixture.runner(engine).submit(video.clone(), FOX.to_string()).wait().await;

        assert!(output_path_of(&state, &fixture.store).exists());
        assert!(!video.exists());
        assert!(!fixture.store.upload_dir().join("clip.mp4.srt").exists());
    }

    #[tokio::test]
    async fn test_empty_transcript_skips_burn_filter() {
        let fixture = Fixture::new().await;
        let video = fixture.upload("silent.mp4");

        let mut engine = MockTranscodeEngine::new();
        engine
            .expect_start()
            .withf(|request| request.subtitles.is_none())
            .times(1)
            .return_once(|request| {
                std::fs::write(&request.output, b"video").unwrap();
                EngineEvents::from_events([EngineEvent::Completed])
            });

        let state = fixture.runner(engine).submit(video.clone(), "   ".to_string()).wait().await;

        assert!(matches!(state, JobState::Succeeded { .. }));
        assert!(!fixture.store.upload_dir().join("silent.mp4.srt").exists());
    }

    #[tokio::test]
    async fn test_subtitle_write_failure_never_starts_engine() {
        let fixture = Fixture::new().await;
        let (_session, mut rx) = fixture.sessions.register();
        let mut engine = MockTranscodeEngine::new();
        engine.expect_start().times(0);

        let missing = fixture.store.upload_dir().join("gone").join("clip.mp4");
        let state = fixture.runner(engine).submit(missing, FOX.to_string()).wait().await;

        let JobState::Failed { message } = state else {
            panic!("expected failure");
        };
        assert!(message.starts_with("could not prepare subtitles"));
        assert_eq!(drain(&mut rx), vec![ProcessingEvent::error(message)]);
    }

    #[tokio::test]
    async fn test_stream_closing_without_outcome_is_a_failure() {
        let fixture = Fixture::new().await;
        let video = fixture.upload("clip.mp4");
        let mut engine = MockTranscodeEngine::new();
        engine
            .expect_start()
            .times(1)
            .return_once(|_| EngineEvents::from_events([EngineEvent::Progress(5.0)]));

        let state = fixture.runner(engine).submit(video.clone(), FOX.to_string()).wait().await;

        assert_eq!(
            state,
            JobState::Failed {
                message: JobError::Interrupted.to_string()
            }
        );
        assert!(!video.exists());
    }

    #[tokio::test]
    async fn test_jobs_are_admitted_one_at_a_time() {
        let fixture = Fixture::new().await;
        let (_session, mut rx) = fixture.sessions.register();
        let first_video = fixture.upload("first.mp4");
        let second_video = fixture.upload("second.mp4");

        let (first_tx, first_events) = EngineEvents::channel(4);
        let streams = Arc::new(Mutex::new(VecDeque::from(vec![
            first_events,
            EngineEvents::from_events([EngineEvent::Progress(60.0), EngineEvent::Completed]),
        ])));
        let mut engine = MockTranscodeEngine::new();
        engine.expect_start().times(2).returning(move |request| {
            std::fs::write(&request.output, b"video").unwrap();
            streams.lock().pop_front().unwrap()
        });

        let runner = fixture.runner(engine);
        let first = runner.submit(first_video, FOX.to_string());
        let second = runner.submit(second_video, FOX.to_string());

        let mut first_state = first.subscribe();
        first_state
            .wait_for(|s| *s == JobState::Running)
            .await
            .unwrap();
        drop(first_state);
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(second.state(), JobState::Queued);

        first_tx.send(EngineEvent::Progress(20.0)).await.unwrap();
        first_tx.send(EngineEvent::Completed).await.unwrap();

        let first_state = first.wait().await;
        let second_state = second.wait().await;
        let (JobState::Succeeded { download_url: a }, JobState::Succeeded { download_url: b }) =
            (&first_state, &second_state)
        else {
            panic!("both jobs should succeed: {:?} {:?}", first_state, second_state);
        };
        assert_ne!(a, b);

        assert_eq!(
            drain(&mut rx),
            vec![
                ProcessingEvent::progress(20),
                ProcessingEvent::complete(a.clone()),
                ProcessingEvent::progress(60),
                ProcessingEvent::complete(b.clone()),
            ]
        );
    }

    #[tokio::test]
    async fn test_huge_cue_length_still_completes_and_cleans_up() {
        let fixture = Fixture::new().await;
        let (_session, mut rx) = fixture.sessions.register();
        let video = fixture.upload("clip.mp4");

        let mut engine = MockTranscodeEngine::new();
        engine.expect_start().times(1).return_once(|request| {
            let srt = std::fs::read_to_string(request.subtitles.unwrap()).unwrap();
            assert!(srt.contains("48:00:00,000 --> 72:00:00,000"));
            std::fs::write(&request.output, b"burned video").unwrap();
            EngineEvents::from_events([EngineEvent::Completed])
        });

        let runner = fixture.runner_with(engine, SubtitleSettings::new(1, u64::MAX / 2));
        let state = runner.submit(video.clone(), "a b c".to_string()).wait().await;

        assert!(output_path_of(&state, &fixture.store).exists());
        assert!(!video.exists());
        assert!(!fixture.store.upload_dir().join("clip.mp4.srt").exists());
        assert!(matches!(
            drain(&mut rx).as_slice(),
            [ProcessingEvent::ProcessingComplete { .. }]
        ));
    }

    #[tokio::test]
    async fn test_events_go_through_the_sink_port() {
        let fixture = Fixture::new().await;
        let video = fixture.upload("clip.mp4");
        let engine = scripted_engine(vec![
            EngineEvent::Progress(30.0),
            EngineEvent::Failed("boom".into()),
        ]);

        let mut sink = MockEventSink::new();
        let mut seq = Sequence::new();
        sink.expect_emit()
            .with(eq(ProcessingEvent::progress(30)))
            .times(1)
            .in_sequence(&mut seq)
            .return_const(true);
        sink.expect_emit()
            .with(eq(ProcessingEvent::error("transcoding failed: boom")))
            .times(1)
            .in_sequence(&mut seq)
            .return_const(false);

        let settings = RunnerSettings {
            subtitles: SubtitleSettings::default(),
            download_base: "http://localhost:3000/processed".to_string(),
            style: CaptionStyle::default(),
        };
        let runner = Arc::new(JobRunner::new(
            engine,
            fixture.store.clone(),
            Arc::new(sink),
            settings,
        ));
        let state = runner.submit(video.clone(), FOX.to_string()).wait().await;

        assert!(matches!(state, JobState::Failed { .. }));
        assert!(!video.exists());
    }

    #[test]
    fn test_download_url_joins_base_and_name() {
        let settings = RunnerSettings {
            subtitles: SubtitleSettings::default(),
            download_base: "http://example.com/processed/".to_string(),
            style: CaptionStyle::default(),
        };
        assert_eq!(
            settings.download_url("processed-1.mp4"),
            "http://example.com/processed/processed-1.mp4"
        );
    }
}
