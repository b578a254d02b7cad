//! End-to-end run: idea → prompts → segments → final video → publish.
//!
//! Per-item failures while generating prompts and segments drop that item
//! and the run carries on with the survivors. Every surviving item keeps
//! the index of the scene it came from. Publishing is best effort.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::api::{TextGeneration, VideoGeneration};
use crate::config::Destination;
use crate::error::{PipelineError, Result};
use crate::publish::{PublishingService, UploadRequest};
use crate::scene::{parse_script, Script};
use crate::video::Concatenator;
use crate::workspace::RunWorkspace;

const FINAL_SUFFIX: &str = "_final_short";
const MAX_SLUG_CHARS: usize = 80;

/// Milestones of a run, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Init,
    IdeaGenerated,
    PromptsGenerated,
    SegmentsGenerated,
    Concatenated,
    Published,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Init => "init",
            Stage::IdeaGenerated => "idea_generated",
            Stage::PromptsGenerated => "prompts_generated",
            Stage::SegmentsGenerated => "segments_generated",
            Stage::Concatenated => "concatenated",
            Stage::Published => "published",
            Stage::Done => "done",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DetailedPrompt {
    pub scene_index: usize,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VideoSegment {
    pub scene_index: usize,
    /// 1-based position among the surviving segments
    pub position: usize,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishOutcome {
    pub platform: String,
    pub url: Option<String>,
    pub error: Option<String>,
}

impl PublishOutcome {
    pub fn succeeded(&self) -> bool {
        self.url.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunStatus {
    Success,
    /// The video was produced but some scene, segment or destination was dropped
    PartialSuccess,
}

/// Summary of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub topic: String,
    pub idea: String,
    pub scene_count: usize,
    pub prompts: Vec<DetailedPrompt>,
    pub segments: Vec<VideoSegment>,
    pub final_video: PathBuf,
    pub published: Vec<PublishOutcome>,
    pub status: RunStatus,
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub work_root: PathBuf,
    pub output_dir: PathBuf,
    pub output_format: String,
    pub fps: u32,
    pub destinations: Vec<Destination>,
}

pub struct Pipeline {
    text: Arc<dyn TextGeneration>,
    video: Arc<dyn VideoGeneration>,
    concatenator: Arc<dyn Concatenator>,
    publisher: PublishingService,
    settings: PipelineSettings,
}

impl Pipeline {
    pub fn new(
        text: Arc<dyn TextGeneration>,
        video: Arc<dyn VideoGeneration>,
        concatenator: Arc<dyn Concatenator>,
        publisher: PublishingService,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            text,
            video,
            concatenator,
            publisher,
            settings,
        }
    }

    /// Run every stage for `topic`.
    pub async fn run(&self, topic: &str) -> Result<RunReport> {
        let run_id = Uuid::new_v4().simple().to_string();
        let span = info_span!("run", run_id = %run_id);
        self.run_stages(topic, run_id).instrument(span).await
    }

    async fn run_stages(&self, topic: &str, run_id: String) -> Result<RunReport> {
        info!(topic, stage = %Stage::Init, "Starting run");

        // 1. 生成创意和分镜
        let script = self.generate_script(topic).await?;
        info!(stage = %Stage::IdeaGenerated, idea = %script.idea, scenes = script.scenes.len(), "Idea generated");

        let workspace = RunWorkspace::create(&self.settings.work_root, &run_id)
            .await
            .map_err(|source| PipelineError::Resource {
                context: format!(
                    "Failed to create working directory in {}",
                    self.settings.work_root.display()
                ),
                source,
            })?;

        // 2. 为每个分镜生成详细提示词
        let prompts = self.generate_prompts(&script).await?;
        info!(stage = %Stage::PromptsGenerated, prompts = prompts.len(), "Prompts generated");

        // 3. 生成视频片段
        let segments = self.generate_segments(&prompts, workspace.path()).await?;
        info!(stage = %Stage::SegmentsGenerated, segments = segments.len(), "Segments generated");

        // 4. 合成视频
        let destination = final_video_path(
            &self.settings.output_dir,
            &script.idea,
            &self.settings.output_format,
        );
        let inputs: Vec<PathBuf> = segments.iter().map(|s| s.path.clone()).collect();
        let final_video = self
            .concatenator
            .concatenate(&inputs, &destination, self.settings.fps)
            .await?;
        info!(stage = %Stage::Concatenated, path = %final_video.display(), "Final video compiled");
        drop(workspace);

        // 5. 发布
        let published = self.publish(topic, &script.idea, &final_video).await;
        info!(
            stage = %Stage::Published,
            succeeded = published.iter().filter(|p| p.succeeded()).count(),
            destinations = published.len(),
            "Publishing finished"
        );

        let complete = prompts.len() == script.scenes.len()
            && segments.len() == prompts.len()
            && published.iter().all(PublishOutcome::succeeded);
        let status = if complete {
            RunStatus::Success
        } else {
            RunStatus::PartialSuccess
        };
        info!(stage = %Stage::Done, status = ?status, "Run finished");

        Ok(RunReport {
            run_id,
            topic: topic.to_string(),
            idea: script.idea,
            scene_count: script.scenes.len(),
            prompts,
            segments,
            final_video,
            published,
            status,
        })
    }

    async fn generate_script(&self, topic: &str) -> Result<Script> {
        let content = self
            .text
            .generate_idea_and_scenes(topic)
            .await
            .map_err(PipelineError::IdeaRequest)?;
        let script = parse_script(&content)?;

        info!(idea = %script.idea, "Overall idea");
        for scene in &script.scenes {
            info!(scene = scene.index, description = %scene.description, "Scene");
        }
        Ok(script)
    }

    async fn generate_prompts(&self, script: &Script) -> Result<Vec<DetailedPrompt>> {
        let mut prompts = Vec::with_capacity(script.scenes.len());
        for scene in &script.scenes {
            match self
                .text
                .generate_scene_prompt(&script.idea, &scene.description)
                .await
            {
                Ok(text) => {
                    info!(scene = scene.index, prompt = %text, "Detailed prompt generated");
                    prompts.push(DetailedPrompt {
                        scene_index: scene.index,
                        text,
                    });
                }
                Err(e) => {
                    error!(scene = scene.index, error = %e, "Failed to generate detailed prompt, skipping scene");
                }
            }
        }

        if prompts.is_empty() {
            return Err(PipelineError::NoPrompts {
                attempted: script.scenes.len(),
            });
        }
        Ok(prompts)
    }

    async fn generate_segments(
        &self,
        prompts: &[DetailedPrompt],
        work_dir: &Path,
    ) -> Result<Vec<VideoSegment>> {
        let mut segments = Vec::with_capacity(prompts.len());
        for prompt in prompts {
            let position = segments.len() + 1;
            match self
                .video
                .generate_segment(&prompt.text, position, prompt.scene_index, work_dir)
                .await
            {
                Ok(path) => {
                    info!(scene = prompt.scene_index, position, path = %path.display(), "Video segment ready");
                    segments.push(VideoSegment {
                        scene_index: prompt.scene_index,
                        position,
                        path,
                    });
                }
                Err(e) => {
                    error!(scene = prompt.scene_index, error = %e, "Failed to generate video segment, skipping scene");
                }
            }
        }

        if segments.is_empty() {
            return Err(PipelineError::NoSegments {
                attempted: prompts.len(),
            });
        }
        Ok(segments)
    }

    /// Upload to every configured destination; failures are recorded, never raised.
    async fn publish(&self, topic: &str, idea: &str, video: &Path) -> Vec<PublishOutcome> {
        let mut outcomes = Vec::with_capacity(self.settings.destinations.len());
        for destination in &self.settings.destinations {
            let request = UploadRequest {
                video: video.to_path_buf(),
                title: render_template(&destination.title, idea, topic),
                description: render_template(&destination.description, idea, topic),
                tags: destination.tags.clone(),
            };
            let outcome = match self.publisher.publish(&destination.platform, &request).await {
                Ok(url) => PublishOutcome {
                    platform: destination.platform.clone(),
                    url: Some(url),
                    error: None,
                },
                Err(e) => {
                    warn!(platform = %destination.platform, error = %e, "Publishing skipped");
                    PublishOutcome {
                        platform: destination.platform.clone(),
                        url: None,
                        error: Some(e.to_string()),
                    }
                }
            };
            outcomes.push(outcome);
        }
        outcomes
    }
}

/// `<output_dir>/<slug>_final_short.<format>`
pub fn final_video_path(output_dir: &Path, idea: &str, format: &str) -> PathBuf {
    output_dir.join(format!("{}{}.{}", slugify(idea), FINAL_SUFFIX, format))
}

/// File-name-safe form of `text`: alphanumerics kept, separators collapsed to `_`.
pub fn slugify(text: &str) -> String {
    let mut slug = String::new();
    let mut pending_separator = false;
    for c in text.chars() {
        if c.is_alphanumeric() {
            if pending_separator && !slug.is_empty() {
                slug.push('_');
            }
            pending_separator = false;
            slug.push(c);
        } else if c.is_whitespace() || c == '-' || c == '_' {
            pending_separator = true;
        }
    }

    let slug: String = slug.chars().take(MAX_SLUG_CHARS).collect();
    let slug = slug.trim_end_matches('_');
    if slug.is_empty() {
        "short".to_string()
    } else {
        slug.to_string()
    }
}

fn render_template(template: &str, idea: &str, topic: &str) -> String {
    template.replace("{idea}", idea).replace("{topic}", topic)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{PublishError, ServiceError, ToolError};
    use crate::publish::Uploader;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::Mutex;

    fn service_error() -> ServiceError {
        ServiceError::Status {
            status: 500,
            body: "boom".to_string(),
        }
    }

    struct FakeText {
        script: String,
        failing_scenes: HashSet<String>,
        fail_idea: bool,
        prompt_calls: Mutex<Vec<String>>,
    }

    impl FakeText {
        fn new(script: &str) -> Self {
            Self {
                script: script.to_string(),
                failing_scenes: HashSet::new(),
                fail_idea: false,
                prompt_calls: Mutex::new(Vec::new()),
            }
        }

        fn failing(mut self, scenes: &[&str]) -> Self {
            self.failing_scenes = scenes.iter().map(|s| s.to_string()).collect();
            self
        }
    }

    #[async_trait]
    impl TextGeneration for FakeText {
        async fn generate_idea_and_scenes(
            &self,
            _topic: &str,
        ) -> std::result::Result<String, ServiceError> {
            if self.fail_idea {
                return Err(service_error());
            }
            Ok(self.script.clone())
        }

        async fn generate_scene_prompt(
            &self,
            overall_idea: &str,
            scene_description: &str,
        ) -> std::result::Result<String, ServiceError> {
            self.prompt_calls
                .lock()
                .unwrap()
                .push(scene_description.to_string());
            if self.failing_scenes.contains(scene_description) {
                return Err(service_error());
            }
            Ok(format!("{overall_idea} / detailed {scene_description}"))
        }
    }

    #[derive(Default)]
    struct FakeVideo {
        failing_prompts: HashSet<String>,
        calls: Mutex<Vec<(String, usize, usize)>>,
    }

    #[async_trait]
    impl VideoGeneration for FakeVideo {
        async fn generate_segment(
            &self,
            prompt: &str,
            position: usize,
            scene_index: usize,
            work_dir: &Path,
        ) -> std::result::Result<PathBuf, ServiceError> {
            self.calls
                .lock()
                .unwrap()
                .push((prompt.to_string(), position, scene_index));
            if self.failing_prompts.contains(prompt) {
                return Err(ServiceError::EmptyLocator);
            }
            let path = work_dir.join(format!("segment_{position:02}_scene_{scene_index:02}.mp4"));
            std::fs::write(&path, prompt).unwrap();
            Ok(path)
        }
    }

    #[derive(Default)]
    struct FakeConcat {
        fail: bool,
        calls: Mutex<Vec<(Vec<PathBuf>, PathBuf, u32)>>,
    }

    #[async_trait]
    impl Concatenator for FakeConcat {
        async fn concatenate(
            &self,
            inputs: &[PathBuf],
            output: &Path,
            fps: u32,
        ) -> std::result::Result<PathBuf, ToolError> {
            assert!(inputs.iter().all(|p| p.exists()), "segments must exist");
            self.calls
                .lock()
                .unwrap()
                .push((inputs.to_vec(), output.to_path_buf(), fps));
            if self.fail {
                return Err(ToolError::Failed {
                    program: "ffmpeg".to_string(),
                    status: "exit status: 1".to_string(),
                    stdout: String::new(),
                    stderr: "bad input".to_string(),
                });
            }
            Ok(output.to_path_buf())
        }
    }

    struct FakeUploader {
        platform: &'static str,
        has_token: bool,
        calls: Arc<Mutex<Vec<(String, String)>>>,
    }

    #[async_trait]
    impl Uploader for FakeUploader {
        fn platform(&self) -> &'static str {
            self.platform
        }

        async fn upload(
            &self,
            request: &UploadRequest,
        ) -> std::result::Result<String, PublishError> {
            if !self.has_token {
                return Err(PublishError::MissingCredential {
                    platform: self.platform,
                    credential: "TOKEN",
                });
            }
            self.calls
                .lock()
                .unwrap()
                .push((self.platform.to_string(), request.title.clone()));
            Ok(format!("https://{}.test/v/1", self.platform))
        }
    }

    struct Harness {
        text: Arc<FakeText>,
        video: Arc<FakeVideo>,
        concat: Arc<FakeConcat>,
        uploads: Arc<Mutex<Vec<(String, String)>>>,
        work_root: tempfile::TempDir,
        output_dir: tempfile::TempDir,
        pipeline: Pipeline,
    }

    fn destination(platform: &str) -> Destination {
        Destination {
            platform: platform.to_string(),
            title: "Short: {idea}".to_string(),
            description: "About {topic}".to_string(),
            tags: vec!["AI".to_string()],
        }
    }

    fn harness(text: FakeText, video: FakeVideo, concat: FakeConcat) -> Harness {
        let text = Arc::new(text);
        let video = Arc::new(video);
        let concat = Arc::new(concat);
        let uploads = Arc::new(Mutex::new(Vec::new()));
        let publisher = PublishingService::new()
            .with(Box::new(FakeUploader {
                platform: "alpha",
                has_token: true,
                calls: uploads.clone(),
            }))
            .with(Box::new(FakeUploader {
                platform: "beta",
                has_token: false,
                calls: uploads.clone(),
            }));
        let work_root = tempfile::tempdir().unwrap();
        let output_dir = tempfile::tempdir().unwrap();
        let settings = PipelineSettings {
            work_root: work_root.path().to_path_buf(),
            output_dir: output_dir.path().to_path_buf(),
            output_format: "mp4".to_string(),
            fps: 24,
            destinations: vec![destination("alpha"), destination("beta"), destination("gamma")],
        };
        let pipeline = Pipeline::new(
            text.clone(),
            video.clone(),
            concat.clone(),
            publisher,
            settings,
        );
        Harness {
            text,
            video,
            concat,
            uploads,
            work_root,
            output_dir,
            pipeline,
        }
    }

    fn work_root_is_empty(h: &Harness) -> bool {
        std::fs::read_dir(h.work_root.path()).unwrap().next().is_none()
    }

    #[tokio::test]
    async fn end_to_end_two_scenes() {
        let h = harness(
            FakeText::new("Idea: Y\nScene 1: A\nScene 2: B"),
            FakeVideo::default(),
            FakeConcat::default(),
        );
        let report = h.pipeline.run("X").await.unwrap();

        assert_eq!(report.idea, "Y");
        assert_eq!(*h.text.prompt_calls.lock().unwrap(), vec!["A", "B"]);

        let video_calls = h.video.calls.lock().unwrap().clone();
        assert_eq!(
            video_calls,
            vec![
                ("Y / detailed A".to_string(), 1, 1),
                ("Y / detailed B".to_string(), 2, 2)
            ]
        );

        let concat_calls = h.concat.calls.lock().unwrap().clone();
        assert_eq!(concat_calls.len(), 1);
        let (inputs, output, fps) = &concat_calls[0];
        assert_eq!(inputs.len(), 2);
        assert_eq!(*fps, 24);
        assert_eq!(output, &h.output_dir.path().join("Y_final_short.mp4"));
        assert_eq!(report.final_video, *output);

        // alpha succeeds, beta lacks a token, gamma is not registered
        assert_eq!(
            *h.uploads.lock().unwrap(),
            vec![("alpha".to_string(), "Short: Y".to_string())]
        );
        let platforms: Vec<_> = report.published.iter().map(|p| p.platform.as_str()).collect();
        assert_eq!(platforms, vec!["alpha", "beta", "gamma"]);
        assert_eq!(report.published[0].url.as_deref(), Some("https://alpha.test/v/1"));
        assert!(report.published[1].error.as_deref().unwrap().contains("TOKEN"));
        assert!(report.published[2]
            .error
            .as_deref()
            .unwrap()
            .contains("No uploader registered"));
        assert_eq!(report.status, RunStatus::PartialSuccess);
        assert!(work_root_is_empty(&h));
    }

    #[tokio::test]
    async fn all_destinations_succeeding_is_success() {
        let mut h = harness(
            FakeText::new("Idea: Y\nScene 1: A"),
            FakeVideo::default(),
            FakeConcat::default(),
        );
        h.pipeline.settings.destinations = vec![destination("alpha")];
        let report = h.pipeline.run("X").await.unwrap();
        assert_eq!(report.status, RunStatus::Success);
    }

    #[tokio::test]
    async fn skipped_scene_keeps_survivors_in_order() {
        let h = harness(
            FakeText::new("Idea: I\nScene 1: A\nScene 2: B\nScene 3: C").failing(&["B"]),
            FakeVideo::default(),
            FakeConcat::default(),
        );
        let report = h.pipeline.run("topic").await.unwrap();

        let scenes: Vec<usize> = report.prompts.iter().map(|p| p.scene_index).collect();
        assert_eq!(scenes, vec![1, 3]);
        let segments: Vec<(usize, usize)> = report
            .segments
            .iter()
            .map(|s| (s.position, s.scene_index))
            .collect();
        assert_eq!(segments, vec![(1, 1), (2, 3)]);
        assert!(report.segments[1]
            .path
            .ends_with("segment_02_scene_03.mp4"));
        assert_eq!(report.status, RunStatus::PartialSuccess);
    }

    #[tokio::test]
    async fn all_prompts_failing_aborts_before_video() {
        let h = harness(
            FakeText::new("Idea: I\nScene 1: A\nScene 2: B").failing(&["A", "B"]),
            FakeVideo::default(),
            FakeConcat::default(),
        );
        let err = h.pipeline.run("topic").await.unwrap_err();

        assert!(matches!(err, PipelineError::NoPrompts { attempted: 2 }));
        assert_eq!(err.stage(), Stage::IdeaGenerated);
        assert!(h.video.calls.lock().unwrap().is_empty());
        assert!(work_root_is_empty(&h));
    }

    #[tokio::test]
    async fn failed_segment_is_skipped() {
        let video = FakeVideo {
            failing_prompts: ["I / detailed A".to_string()].into_iter().collect(),
            ..Default::default()
        };
        let h = harness(
            FakeText::new("Idea: I\nScene 1: A\nScene 2: B"),
            video,
            FakeConcat::default(),
        );
        let report = h.pipeline.run("topic").await.unwrap();

        assert_eq!(report.segments.len(), 1);
        assert_eq!(report.segments[0].position, 1);
        assert_eq!(report.segments[0].scene_index, 2);
        let concat_calls = h.concat.calls.lock().unwrap();
        assert_eq!(concat_calls[0].0.len(), 1);
    }

    #[tokio::test]
    async fn all_segments_failing_aborts_before_concat() {
        let video = FakeVideo {
            failing_prompts: ["I / detailed A".to_string(), "I / detailed B".to_string()]
                .into_iter()
                .collect(),
            ..Default::default()
        };
        let h = harness(
            FakeText::new("Idea: I\nScene 1: A\nScene 2: B"),
            video,
            FakeConcat::default(),
        );
        let err = h.pipeline.run("topic").await.unwrap_err();

        assert!(matches!(err, PipelineError::NoSegments { attempted: 2 }));
        assert_eq!(err.stage(), Stage::PromptsGenerated);
        assert!(h.concat.calls.lock().unwrap().is_empty());
        assert!(h.uploads.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unparseable_script_aborts() {
        let h = harness(
            FakeText::new("Sorry, I cannot help with that."),
            FakeVideo::default(),
            FakeConcat::default(),
        );
        let err = h.pipeline.run("topic").await.unwrap_err();

        assert!(matches!(err, PipelineError::Parse(crate::error::ParseError::MissingIdea)));
        assert!(h.text.prompt_calls.lock().unwrap().is_empty());
        assert!(work_root_is_empty(&h));
    }

    #[tokio::test]
    async fn idea_request_failure_aborts() {
        let mut text = FakeText::new("Idea: I\nScene 1: A");
        text.fail_idea = true;
        let h = harness(text, FakeVideo::default(), FakeConcat::default());
        let err = h.pipeline.run("topic").await.unwrap_err();

        assert!(matches!(err, PipelineError::IdeaRequest(_)));
        assert_eq!(err.stage(), Stage::Init);
    }

    #[tokio::test]
    async fn concat_failure_aborts_and_cleans_up() {
        let h = harness(
            FakeText::new("Idea: I\nScene 1: A"),
            FakeVideo::default(),
            FakeConcat {
                fail: true,
                ..Default::default()
            },
        );
        let err = h.pipeline.run("topic").await.unwrap_err();

        assert!(matches!(err, PipelineError::Concatenation(ToolError::Failed { .. })));
        assert_eq!(err.stage(), Stage::SegmentsGenerated);
        assert!(h.uploads.lock().unwrap().is_empty());
        assert!(work_root_is_empty(&h));
    }

    #[test]
    fn slugify_idea() {
        assert_eq!(
            slugify("Space battle with the Federation fleet"),
            "Space_battle_with_the_Federation_fleet"
        );
        assert_eq!(slugify("  What?! A  cat -- on Mars. "), "What_A_cat_on_Mars");
        assert_eq!(slugify("Битва флота"), "Битва_флота");
        assert_eq!(slugify("!!!"), "short");
        assert_eq!(slugify(&"a".repeat(200)).len(), MAX_SLUG_CHARS);
    }

    #[test]
    fn final_path_uses_format() {
        let path = final_video_path(Path::new("out"), "A quiet harbor", "webm");
        assert_eq!(path, PathBuf::from("out/A_quiet_harbor_final_short.webm"));
    }

    #[test]
    fn templates_substitute_idea_and_topic() {
        assert_eq!(
            render_template("{idea} ({topic}) {idea}", "Y", "X"),
            "Y (X) Y"
        );
    }
}
