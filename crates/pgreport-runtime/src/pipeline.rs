//! Two-stage report pipeline: fetch log text, feed it to the report generator

use chrono::Utc;
use pgreport_core::{Error, ReportPaths, Result, ServerConfig};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::process::{ExitStatus, Stdio};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::process::{Child, ChildStdin, ChildStdout};
use tracing::{debug, info, warn};

use crate::filter::PsqlOutputFilter;
use crate::process::ProcessGroups;
use crate::traits::ReportTools;

/// Final state of both stages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineExit {
    /// All fetched text reached the report generator
    pub streamed: bool,
    pub fetch: Option<ExitStatus>,
    pub render: Option<ExitStatus>,
}

impl PipelineExit {
    pub fn success(&self) -> bool {
        self.streamed
            && self.fetch.map_or(false, |s| s.success())
            && self.render.map_or(false, |s| s.success())
    }
}

/// Both stages started; `run` drives them to completion
pub struct RunningPipeline {
    report_name: String,
    fetch: Child,
    render: Child,
    fetch_pid: Option<u32>,
    render_pid: Option<u32>,
    groups: ProcessGroups,
    output: File,
}

/// Start both stages of the pipeline for one log file
///
/// The diagnostic output file is truncated and receives the report
/// generator's stdout/stderr and the fetch stage's stderr. If the fetch
/// stage cannot be started, the already running generator is killed.
pub fn spawn_pipeline(
    tools: &dyn ReportTools,
    server: &ServerConfig,
    log_file: &str,
    paths: &ReportPaths,
    groups: &ProcessGroups,
) -> Result<RunningPipeline> {
    File::create(&paths.output_path)?;
    let mut output = OpenOptions::new().append(true).open(&paths.output_path)?;
    let render_out = output.try_clone()?;
    let render_err = output.try_clone()?;
    let fetch_err = output.try_clone()?;

    write_note(
        &mut output,
        &format!("Generating {} from {}:{}", paths.report_name, server.name, log_file),
    );

    let mut render_cmd = tools.render_command(&paths.report_path);
    render_cmd
        .stdin(Stdio::piped())
        .stdout(render_out)
        .stderr(render_err)
        .process_group(0)
        .kill_on_drop(false);

    let render = render_cmd.spawn().map_err(|e| {
        Error::process_start(format!("Failed to start report generator: {}", e))
    })?;
    track(groups, &render);

    let mut fetch_cmd = tools.fetch_command(server, log_file);
    fetch_cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(fetch_err)
        .process_group(0)
        .kill_on_drop(false);

    let fetch = match fetch_cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            // Dropped child is reaped by tokio once the group is dead
            if let Err(kill_err) = groups.terminate() {
                warn!("Failed to kill report generator: {}", kill_err);
            }
            return Err(Error::process_start(format!(
                "Failed to start log fetch: {}",
                e
            )));
        }
    };
    track(groups, &fetch);

    info!(
        "Started pipeline for {} (fetch pid {:?}, render pid {:?})",
        paths.report_name,
        fetch.id(),
        render.id()
    );

    Ok(RunningPipeline {
        report_name: paths.report_name.clone(),
        fetch_pid: fetch.id(),
        render_pid: render.id(),
        fetch,
        render,
        groups: groups.clone(),
        output,
    })
}

fn track(groups: &ProcessGroups, child: &Child) {
    if let Some(pid) = child.id() {
        if !groups.add(pid) {
            debug!("Pipeline stopped before process {} was tracked", pid);
        }
    }
}

impl RunningPipeline {
    /// Stream stage A into stage B, then wait for both to exit
    ///
    /// Failures are appended to the diagnostic output file.
    pub async fn run(mut self) -> PipelineExit {
        let streamed = match (self.fetch.stdout.take(), self.render.stdin.take()) {
            (Some(stdout), Some(stdin)) => match pump(stdout, stdin).await {
                Ok(bytes) => {
                    debug!("Streamed {} bytes into {}", bytes, self.report_name);
                    true
                }
                Err(e) => {
                    self.note(&format!("Error streaming log content: {}", e));
                    false
                }
            },
            _ => {
                self.note("Error streaming log content: stdio not captured");
                false
            }
        };

        let fetch = match self.fetch.wait().await {
            Ok(status) => {
                self.untrack(self.fetch_pid);
                Some(status)
            }
            Err(e) => {
                self.note(&format!("Error waiting for log fetch: {}", e));
                None
            }
        };
        if let Some(status) = fetch.filter(|s| !s.success()) {
            self.note(&format!("Log fetch failed: {}", status));
        }

        let render = match self.render.wait().await {
            Ok(status) => {
                self.untrack(self.render_pid);
                Some(status)
            }
            Err(e) => {
                self.note(&format!("Error waiting for report generator: {}", e));
                None
            }
        };
        if let Some(status) = render.filter(|s| !s.success()) {
            self.note(&format!("Error generating report: {}", status));
        }

        let exit = PipelineExit {
            streamed,
            fetch,
            render,
        };
        if exit.success() {
            self.note("Report generation finished");
            info!("Report {} generated", self.report_name);
        } else {
            warn!("Report generation failed for {}: {:?}", self.report_name, exit);
        }
        exit
    }

    /// Reaped stages must not be signalled again
    fn untrack(&self, pid: Option<u32>) {
        if let Some(pid) = pid {
            self.groups.remove(pid);
        }
    }

    fn note(&mut self, message: &str) {
        write_note(&mut self.output, message);
    }
}

fn write_note(output: &mut File, message: &str) {
    let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S");
    if let Err(e) = writeln!(output, "[{}] {}", timestamp, message) {
        warn!("Failed to write diagnostic output: {}", e);
    }
}

/// Copy fetch output into the generator, minus psql's header and footer
async fn pump(stdout: ChildStdout, stdin: ChildStdin) -> std::io::Result<u64> {
    let mut reader = BufReader::new(stdout);
    let mut writer = BufWriter::new(stdin);
    let mut filter = PsqlOutputFilter::new();
    let mut written = 0u64;

    loop {
        let mut line = Vec::new();
        if reader.read_until(b'\n', &mut line).await? == 0 {
            break;
        }
        if let Some(out) = filter.push(line) {
            writer.write_all(&out).await?;
            written += out.len() as u64;
        }
    }
    if let Some(out) = filter.finish() {
        writer.write_all(&out).await?;
        written += out.len() as u64;
    }

    writer.flush().await?;
    writer.shutdown().await?;
    Ok(written)
}
