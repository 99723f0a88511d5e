use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use crate::config::ToolPaths;
use crate::error::{Error, Result};
use crate::infra::cache;
use crate::media::subtitles::ExtractedSubtitle;
use crate::media::tools::{ToolInvocation, ToolRunner};

/// Returns the path of a text (SRT) version of `subtitle`, running OCR for
/// bitmap formats. The result lands next to the bitmap in the cache and is
/// reused on later runs.
pub async fn to_text(
    subtitle: &ExtractedSubtitle,
    tools: &ToolPaths,
    runner: &dyn ToolRunner,
    cancel: &CancellationToken,
) -> Result<PathBuf> {
    if let ExtractedSubtitle::Text { path, .. } = subtitle {
        return Ok(path.clone());
    }

    let text_path = subtitle.text_path();
    if tokio::fs::try_exists(&text_path).await? {
        return Ok(text_path);
    }

    let staging = staging_dir(subtitle.path())?;
    let staged = match subtitle {
        ExtractedSubtitle::DvdBitmap { path, .. } => {
            tracing::info!(path = %path.display(), "Converting DVD bitmap subtitles to text");
            vobsub_to_srt(runner, &tools.vobsub2srt, path, staging.path(), cancel).await?
        }
        ExtractedSubtitle::ImageBitmap { path, .. } => {
            tracing::info!(path = %path.display(), "Converting PGS bitmap subtitles to text");
            pgs_to_srt(runner, &tools.pgs_to_srt, path, staging.path(), cancel).await?
        }
        ExtractedSubtitle::Text { path, .. } => return Ok(path.clone()),
    };

    cache::commit(&staged, &text_path).await?;
    Ok(text_path)
}

fn staging_dir(artifact: &Path) -> Result<TempDir> {
    let parent = artifact.parent().unwrap_or(Path::new("."));
    Ok(tempfile::Builder::new()
        .prefix(".staging-")
        .tempdir_in(parent)?)
}

/// vobsub2srt reads `<base>.idx`/`<base>.sub` and writes `<base>.srt`, so the
/// pair is copied into the staging folder to keep its output out of the
/// cache until it is complete.
async fn vobsub_to_srt(
    runner: &dyn ToolRunner,
    vobsub2srt: &str,
    sub_path: &Path,
    staging: &Path,
    cancel: &CancellationToken,
) -> Result<PathBuf> {
    let base = staging.join("vobsub");
    tokio::fs::copy(sub_path, base.with_extension("sub")).await?;
    tokio::fs::copy(sub_path.with_extension("idx"), base.with_extension("idx")).await?;

    let invocation = ToolInvocation::new(vobsub2srt)
        .args(["-l", "en"])
        .arg(&base);
    runner.run(&invocation, cancel).await?.check(vobsub2srt)?;

    expect_output(vobsub2srt, base.with_extension("srt")).await
}

async fn pgs_to_srt(
    runner: &dyn ToolRunner,
    command: &[String],
    sup_path: &Path,
    staging: &Path,
    cancel: &CancellationToken,
) -> Result<PathBuf> {
    let Some((program, leading_args)) = command.split_first() else {
        return Err(Error::NotSupported(
            "no PGS to SRT converter is configured".to_string(),
        ));
    };

    let output = staging.join("pgs.srt");
    let invocation = ToolInvocation::new(program)
        .args(leading_args)
        .arg("--input")
        .arg(sup_path)
        .arg("--output")
        .arg(&output);
    runner.run(&invocation, cancel).await?.check(program)?;

    expect_output(program, output).await
}

async fn expect_output(tool: &str, path: PathBuf) -> Result<PathBuf> {
    if tokio::fs::try_exists(&path).await? {
        Ok(path)
    } else {
        Err(Error::ToolFailed {
            tool: tool.to_string(),
            code: Some(0),
            stderr: format!("expected output {} was not written", path.display()),
        })
    }
}
