use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, error::ErrorKind};

use crate::assembler::Assembler;
use crate::config::{DatasetConfig, FirstWindow};
use crate::constants::registry::DEFAULT_CONFIG_NAME;
use crate::data::Example;
use crate::fetch::{ContentFetcher, HttpFetcher, LocalFetcher};
use crate::registry::{Catalog, Configuration};

const PROMPT_PREVIEW_CHARS: usize = 60;

#[derive(Debug, Parser)]
#[command(
    name = "list_configs",
    disable_help_subcommand = true,
    about = "List dataset configurations",
    long_about = "Print every named configuration with its selection policy, advertised size, and shard count.",
    after_help = "Catalog options fall back to DIFFUSIONDB_SEED and DIFFUSIONDB_FIRST_WINDOW when not given."
)]
struct ListConfigsCli {
    #[arg(long, help = "Seed for random-policy shard selection")]
    seed: Option<u64>,
    #[arg(
        long = "first-window",
        value_name = "MODE",
        value_parser = parse_first_window,
        help = "Window used by first_* configurations: leading or skip-first"
    )]
    first_window: Option<FirstWindow>,
    #[arg(long = "show-shards", help = "Print resolved shard ids for each configuration")]
    show_shards: bool,
}

#[derive(Debug, Parser)]
#[command(
    name = "preview_examples",
    disable_help_subcommand = true,
    about = "Stream the first examples of a configuration",
    long_about = "Fetch shards on demand and print one summary line per emitted example.",
    after_help = "Resources come from --mirror-root, --mirror-url, or the Hugging Face Hub, in that order."
)]
/// CLI for `preview_examples`.
///
/// Common usage:
/// - Preview the default configuration from the Hub: no flags
/// - Read a local mirror of the repository layout: `--mirror-root /data/diffusiondb`
/// - Read a plain HTTP mirror: `--mirror-url http://host/diffusiondb`
struct PreviewCli {
    #[arg(long, default_value = DEFAULT_CONFIG_NAME, help = "Configuration name to stream")]
    config: String,
    #[arg(long, help = "Seed for random-policy shard selection")]
    seed: Option<u64>,
    #[arg(
        long,
        default_value_t = 5,
        value_parser = parse_positive_usize,
        help = "Number of examples to print"
    )]
    limit: usize,
    #[arg(long = "cache-dir", value_name = "PATH", help = "Cache directory override")]
    cache_dir: Option<PathBuf>,
    #[arg(
        long = "mirror-root",
        value_name = "PATH",
        conflicts_with = "mirror_url",
        help = "Local directory laid out like the dataset repository"
    )]
    mirror_root: Option<PathBuf>,
    #[arg(long = "mirror-url", value_name = "URL", help = "Base URL of an HTTP mirror")]
    mirror_url: Option<String>,
    #[arg(long, help = "Fetch every resource of the configuration before streaming")]
    prefetch: bool,
}

/// Run the `list_configs` CLI with the given arguments (program name excluded).
pub fn run_list_configs<I>(args_iter: I) -> Result<(), Box<dyn Error>>
where
    I: Iterator<Item = String>,
{
    let Some(cli) =
        parse_cli::<ListConfigsCli, _>(std::iter::once("list_configs".to_string()).chain(args_iter))?
    else {
        return Ok(());
    };

    let mut config = DatasetConfig::from_env()?;
    if let Some(seed) = cli.seed {
        config.catalog.seed = Some(seed);
    }
    if let Some(window) = cli.first_window {
        config.catalog.first_window = window;
    }

    let catalog = Catalog::build(&config.catalog);
    for line in config_lines(&catalog, cli.show_shards) {
        println!("{line}");
    }
    Ok(())
}

/// Run the `preview_examples` CLI with the given arguments (program name excluded).
pub fn run_preview<I>(args_iter: I) -> Result<(), Box<dyn Error>>
where
    I: Iterator<Item = String>,
{
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let Some(cli) =
        parse_cli::<PreviewCli, _>(std::iter::once("preview_examples".to_string()).chain(args_iter))?
    else {
        return Ok(());
    };

    let mut config = DatasetConfig::from_env()?;
    if let Some(seed) = cli.seed {
        config.catalog.seed = Some(seed);
    }
    if let Some(dir) = &cli.cache_dir {
        config.fetch.cache_dir = dir.clone();
    }

    let fetcher = build_fetcher(&cli, &config)?;
    let assembler = Assembler::from_config(&config, fetcher);
    let fields = assembler.features(&cli.config)?;
    println!(
        "Streaming '{}' (fields: {})",
        cli.config,
        fields
            .iter()
            .map(|field| format!("{}:{}", field.name, field.dtype))
            .collect::<Vec<_>>()
            .join(", ")
    );
    if cli.prefetch {
        assembler.prefetch(&cli.config)?;
    }

    let mut printed = 0usize;
    for item in assembler.stream(&cli.config)?.take(cli.limit) {
        let (key, example) = item?;
        printed += 1;
        println!("{}", summarize(printed, &key, &example));
    }
    if printed == 0 {
        println!("Configuration '{}' produced no examples.", cli.config);
    }
    Ok(())
}

fn build_fetcher(
    cli: &PreviewCli,
    config: &DatasetConfig,
) -> Result<Arc<dyn ContentFetcher>, Box<dyn Error>> {
    if let Some(root) = &cli.mirror_root {
        return Ok(Arc::new(LocalFetcher::new(root, &config.fetch.cache_dir)));
    }
    if let Some(url) = &cli.mirror_url {
        return Ok(Arc::new(HttpFetcher::new(url.as_str(), &config.fetch.cache_dir)));
    }
    hub_fetcher(config)
}

#[cfg(feature = "huggingface")]
fn hub_fetcher(config: &DatasetConfig) -> Result<Arc<dyn ContentFetcher>, Box<dyn Error>> {
    Ok(Arc::new(crate::fetch::HubFetcher::new(config.fetch.clone())?))
}

#[cfg(not(feature = "huggingface"))]
fn hub_fetcher(_config: &DatasetConfig) -> Result<Arc<dyn ContentFetcher>, Box<dyn Error>> {
    Err("built without the `huggingface` feature; pass --mirror-root or --mirror-url".into())
}

fn config_lines(catalog: &Catalog, show_shards: bool) -> Vec<String> {
    let mut lines = vec![format!(
        "{:<12} {:<9} {:>6} {:>7}  {}",
        "name", "policy", "size", "shards", "description"
    )];
    for config in catalog.list_configs() {
        lines.push(config_line(config));
        if show_shards && !config.shard_ids().is_empty() {
            lines.push(format!(
                "    shards: {}",
                config
                    .shard_ids()
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(",")
            ));
        }
    }
    lines
}

fn config_line(config: &Configuration) -> String {
    let size = config
        .size()
        .map(|size| size.label().to_string())
        .unwrap_or_else(|| "-".to_string());
    format!(
        "{:<12} {:<9} {:>6} {:>7}  {}",
        config.name(),
        config.policy().as_str(),
        size,
        config.shard_ids().len(),
        config.description()
    )
}

fn summarize(index: usize, key: &str, example: &Example) -> String {
    let params = example.parameters();
    let detail = match example {
        Example::Image(image) => format!("bytes={}", image.image.bytes.len()),
        Example::Text(text) => format!("part={}", text.part_id),
    };
    format!(
        "{index:>3}. {key} [{detail} seed={} step={} cfg={:.1} sampler={}] {}",
        params.seed,
        params.step,
        params.cfg,
        params.sampler,
        preview_prompt(&params.prompt)
    )
}

fn preview_prompt(prompt: &str) -> String {
    let mut chars = prompt.chars();
    let head: String = chars.by_ref().take(PROMPT_PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

fn parse_positive_usize(raw: &str) -> Result<usize, String> {
    let parsed = raw
        .parse::<usize>()
        .map_err(|_| format!("Could not parse --limit value '{raw}' as a positive integer"))?;
    if parsed == 0 {
        return Err("--limit must be greater than zero".to_string());
    }
    Ok(parsed)
}

fn parse_first_window(raw: &str) -> Result<FirstWindow, String> {
    raw.parse::<FirstWindow>().map_err(|err| err.to_string())
}

fn parse_cli<T, I>(args: I) -> Result<Option<T>, Box<dyn Error>>
where
    T: Parser,
    I: IntoIterator,
    I::Item: Into<std::ffi::OsString> + Clone,
{
    match T::try_parse_from(args) {
        Ok(cli) => Ok(Some(cli)),
        Err(err) => match err.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                err.print()?;
                Ok(None)
            }
            _ => Err(err.into()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CatalogOptions;
    use crate::data::{ImageExample, ImagePayload, Sampler, TextExample};
    use std::fs;
    use tempfile::tempdir;

    fn args(raw: &[&str]) -> impl Iterator<Item = String> {
        raw.iter().map(ToString::to_string).collect::<Vec<_>>().into_iter()
    }

    #[test]
    fn help_exits_cleanly() {
        assert!(run_list_configs(args(&["--help"])).is_ok());
        assert!(run_preview(args(&["--help"])).is_ok());
    }

    #[test]
    fn invalid_flags_are_errors() {
        assert!(run_preview(args(&["--limit", "0"])).is_err());
        assert!(run_preview(args(&["--mirror-root", "/a", "--mirror-url", "http://b"])).is_err());
        assert!(run_list_configs(args(&["--first-window", "middle"])).is_err());
    }

    #[test]
    fn list_covers_every_configuration() {
        let catalog = Catalog::build(&CatalogOptions::seeded(3));
        let lines = config_lines(&catalog, false);
        assert_eq!(lines.len(), 17);
        assert!(lines[1].starts_with("first_1k"));
        assert!(lines.iter().any(|line| line.starts_with("text_only") && line.contains(" - ")));

        let with_shards = config_lines(&catalog, true);
        assert_eq!(with_shards.len(), 17 + 15);
        assert_eq!(with_shards[2], "    shards: 1");
    }

    #[test]
    fn summaries_show_kind_specific_detail() {
        let image = Example::Image(ImageExample {
            image: ImagePayload {
                path: PathBuf::from("a.png"),
                bytes: vec![0; 4],
            },
            prompt: "x".repeat(80),
            seed: 1,
            step: 20,
            cfg: 7.5,
            sampler: Sampler::Ddim,
        });
        let line = summarize(1, "a.png", &image);
        assert!(line.starts_with("  1. a.png [bytes=4 seed=1 step=20 cfg=7.5 sampler=ddim]"));
        assert!(line.ends_with("..."));

        let text = Example::Text(TextExample {
            image_name: "x".into(),
            prompt: "dog".into(),
            part_id: 3,
            seed: 9,
            step: 10,
            cfg: 6.0,
            sampler: Sampler::Plms,
        });
        assert_eq!(
            summarize(2, "x", &text),
            "  2. x [part=3 seed=9 step=10 cfg=6.0 sampler=plms] dog"
        );
    }

    #[test]
    fn preview_reads_a_local_mirror() {
        let mirror = tempdir().unwrap();
        let cache = tempdir().unwrap();
        let shard_dir = mirror.path().join("images").join("part-000001");
        fs::create_dir_all(&shard_dir).unwrap();
        fs::write(shard_dir.join("a.png"), b"png").unwrap();
        fs::write(
            shard_dir.join("part-000001.json"),
            r#"{"a.png": {"p": "cat", "se": 1, "st": 20, "c": 7.5, "sa": "ddim"}}"#,
        )
        .unwrap();

        let mirror_root = mirror.path().to_string_lossy().to_string();
        let cache_dir = cache.path().to_string_lossy().to_string();
        run_preview(args(&[
            "--config",
            "first_1k",
            "--limit",
            "1",
            "--mirror-root",
            &mirror_root,
            "--cache-dir",
            &cache_dir,
        ]))
        .unwrap();

        let err = run_preview(args(&[
            "--config",
            "first_5k",
            "--limit",
            "3",
            "--mirror-root",
            &mirror_root,
            "--cache-dir",
            &cache_dir,
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("part-000002.zip"));
    }
}
