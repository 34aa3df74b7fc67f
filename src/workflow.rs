use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{error, info, warn};
use walkdir::WalkDir;

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::pacing::{Pacer, TokioPacer};
use crate::pipeline::ChunkedProcessor;
use crate::provider::Provider;
use crate::session::ProviderSession;
use crate::subtitle::RawDocument;

/// What happened to one input file
#[derive(Debug)]
pub enum FileOutcome {
    Written { output: PathBuf, provider: String },
    Skipped { reason: String },
    Failed { error: AppError },
}

#[derive(Debug)]
pub struct FileReport {
    pub input: PathBuf,
    pub outcome: FileOutcome,
}

/// Per-file outcomes of a batch run
#[derive(Debug, Default)]
pub struct BatchReport {
    pub files: Vec<FileReport>,
    /// Errors raised while releasing provider resources after the batch
    pub release_errors: Vec<AppError>,
}

impl BatchReport {
    pub fn written(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::Written { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::Skipped { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::Failed { .. }))
    }

    pub fn has_failures(&self) -> bool {
        self.failed() > 0
    }

    fn count(&self, predicate: impl Fn(&FileOutcome) -> bool) -> usize {
        self.files.iter().filter(|f| predicate(&f.outcome)).count()
    }
}

/// Output document: optional `# title` line, blank line, cleaned text
pub fn render_output(title: &str, text: &str, include_title: bool) -> String {
    if include_title {
        format!("# {}\n\n{}", title, text)
    } else {
        text.to_string()
    }
}

pub struct Workflow {
    config: Config,
    processor: ChunkedProcessor,
    pacer: Arc<dyn Pacer>,
}

impl Workflow {
    pub fn new(config: Config) -> Result<Self> {
        Self::with_pacer(config, Arc::new(TokioPacer))
    }

    pub fn with_pacer(config: Config, pacer: Arc<dyn Pacer>) -> Result<Self> {
        config.validate()?;
        let processor = ChunkedProcessor::with_pacer(&config, Arc::clone(&pacer))?;
        Ok(Self {
            config,
            processor,
            pacer,
        })
    }

    /// Subtitle files directly inside `input_dir`, sorted by name
    pub fn find_subtitle_files<P: AsRef<Path>>(&self, input_dir: P) -> Result<Vec<PathBuf>> {
        let input_dir = input_dir.as_ref();
        if !input_dir.is_dir() {
            return Err(AppError::FileNotFound(format!(
                "Input directory does not exist: {}",
                input_dir.display()
            )));
        }

        let wanted = self.config.processing.input_extension.to_lowercase();
        let files: Vec<PathBuf> = WalkDir::new(input_dir)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| {
                e.path()
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| ext.to_lowercase() == wanted)
            })
            .map(|e| e.into_path())
            .collect();

        Ok(files)
    }

    /// Process a whole directory, then release the session's providers
    /// whatever the outcome.
    pub async fn run<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        mut session: ProviderSession,
        input_dir: P,
        output_dir: Q,
    ) -> Result<BatchReport> {
        let outcome = self.process_directory(session.providers(), input_dir, output_dir).await;
        let release_errors = session.release_all().await;

        let mut report = outcome?;
        report.release_errors = release_errors;
        Ok(report)
    }

    pub async fn process_directory<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        providers: &[Box<dyn Provider>],
        input_dir: P,
        output_dir: Q,
    ) -> Result<BatchReport> {
        let input_dir = input_dir.as_ref();
        let output_dir = output_dir.as_ref();

        let files = self.find_subtitle_files(input_dir)?;
        fs::create_dir_all(output_dir).await?;

        let mut report = BatchReport::default();
        if files.is_empty() {
            warn!("No .{} files found in {}", self.config.processing.input_extension, input_dir.display());
            return Ok(report);
        }

        info!("Processing {} subtitle file(s) from {}", files.len(), input_dir.display());

        let pb = ProgressBar::new(files.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );

        let total = files.len();
        for (i, input) in files.into_iter().enumerate() {
            let file_name = input.file_name().unwrap_or_default().to_string_lossy().into_owned();
            pb.set_message(file_name.clone());
            info!("[{}/{}] {}", i + 1, total, file_name);

            let outcome = self.process_file(providers, &input, output_dir).await;
            match &outcome {
                FileOutcome::Written { output, provider } => {
                    info!("    Done via {} -> {}", provider, output.display())
                }
                FileOutcome::Skipped { reason } => info!("    Skipping: {}", reason),
                FileOutcome::Failed { error } => error!("    Failed: {}", error),
            }

            let pause = i + 1 < total && !matches!(outcome, FileOutcome::Skipped { .. });
            report.files.push(FileReport { input, outcome });
            pb.inc(1);

            if pause {
                self.pacer.pause(self.config.rate_limit.request_interval()).await;
            }
        }

        pb.finish_with_message("done");
        info!(
            "Finished: {} written, {} skipped, {} failed",
            report.written(),
            report.skipped(),
            report.failed()
        );

        Ok(report)
    }

    /// Extract, clean and write one subtitle file; errors stay local to it
    pub async fn process_file(
        &self,
        providers: &[Box<dyn Provider>],
        input: &Path,
        output_dir: &Path,
    ) -> FileOutcome {
        let document = match RawDocument::load(input).await {
            Ok(document) => document,
            Err(error) => return FileOutcome::Failed { error },
        };

        if document.is_blank() {
            return FileOutcome::Skipped {
                reason: "No text content found".to_string(),
            };
        }

        let result = match self.processor.process(providers, &document.text).await {
            Ok(result) => result,
            Err(error) => return FileOutcome::Failed { error },
        };

        let output = output_dir.join(format!(
            "{}.{}",
            document.title, self.config.processing.output_extension
        ));
        let content = render_output(
            &document.title,
            &result.text,
            self.config.processing.include_filename_as_title,
        );

        match fs::write(&output, content).await {
            Ok(()) => FileOutcome::Written {
                output,
                provider: result.provider,
            },
            Err(e) => FileOutcome::Failed { error: e.into() },
        }
    }
}
