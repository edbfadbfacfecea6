//! Video compression handler
//!
//! Re-encodes a video to H.264/AAC with the configured encoder binary.
//! Input and output paths come from the job's `input` and `output` fields
//! and are resolved against the shared root.

use async_trait::async_trait;
use cluster_core::domain::job::Job;
use std::path::Path;
use tokio::process::Command;
use tracing::{error, info};

use super::{HandlerOutcome, JobHandler};
use crate::config::Config;

pub struct CompressVideoHandler;

impl CompressVideoHandler {
    pub const JOB_TYPE: &'static str = "compress-video";

    /// Encoder arguments for one input/output pair
    fn encoder_args(input: &Path, output: &Path) -> Vec<String> {
        vec![
            "-i".to_string(),
            input.display().to_string(),
            "-vcodec".to_string(),
            "libx264".to_string(),
            "-crf".to_string(),
            "23".to_string(),
            "-preset".to_string(),
            "medium".to_string(),
            "-acodec".to_string(),
            "aac".to_string(),
            "-b:a".to_string(),
            "128k".to_string(),
            output.display().to_string(),
        ]
    }
}

#[async_trait]
impl JobHandler for CompressVideoHandler {
    async fn handle(&self, job: &Job, config: &Config) -> HandlerOutcome {
        let job_id = job.id();

        let (Some(input), Some(output)) = (job.payload_str("input"), job.payload_str("output"))
        else {
            error!("[{}] compress-video job needs 'input' and 'output'", job_id);
            return HandlerOutcome::error("missing input or output path");
        };

        let input = config.resolve_path(input);
        let output = config.resolve_path(output);
        let args = Self::encoder_args(&input, &output);

        info!(
            "[{}] Running compress-video: {} {}",
            job_id,
            config.ffmpeg_path,
            args.join(" ")
        );

        match Command::new(&config.ffmpeg_path).args(&args).status().await {
            Ok(status) if status.success() => {
                info!(
                    "[{}] Video compression complete: {}",
                    job_id,
                    output.display()
                );
                HandlerOutcome::Success
            }
            Ok(status) => {
                error!("[{}] Video compression failed: {}", job_id, status);
                HandlerOutcome::error(format!("encoder exited with {}", status))
            }
            Err(e) => {
                error!(
                    "[{}] Failed to start encoder '{}': {}",
                    job_id, config.ffmpeg_path, e
                );
                HandlerOutcome::error(format!("failed to start encoder: {}", e))
            }
        }
    }
}
