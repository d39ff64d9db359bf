/// `tangle render` command implementation
///
/// Renders a document once, or keeps re-rendering it with `--watch`.
use anyhow::Result;
use std::path::Path;
use std::time::Duration;

use super::build_pipeline;
use crate::cli::RenderArgs;
use crate::cli_utils::tangle_prefix;
use crate::config_discovery::load_config_with_discovery;
use crate::merger;
use crate::pipeline::resolve_output_path;
use crate::watch::WatchLoop;

pub async fn run(args: RenderArgs) -> Result<()> {
    let file_config = load_config_with_discovery(args.config.config.as_deref())?;
    let config = merger::merge(&args.config, file_config)?;

    let document = Path::new(&args.markdown);
    if !document.is_file() {
        anyhow::bail!("Document not found: {}", args.markdown);
    }
    let output = Path::new(&args.output);
    let target = resolve_output_path(document, output)?;

    let mut pipeline = build_pipeline(&config)?;

    if args.watch {
        let watch = WatchLoop::new(document, output)
            .with_debounce(Duration::from_millis(config.watch.debounce_ms));
        watch.render_once(&mut pipeline);
        return watch.run(&mut pipeline).await;
    }

    let report = pipeline.render_file(document, output)?;

    eprintln!(
        "{} Rendered {} -> {}",
        tangle_prefix(),
        args.markdown,
        target.display()
    );
    eprintln!(
        "{} {} blocks: {} from cache, {} executed, {} artifacts stored, {} reused",
        tangle_prefix(),
        report.blocks,
        report.cache_hits,
        report.executions,
        report.artifacts_stored,
        report.artifacts_reused
    );

    Ok(())
}
