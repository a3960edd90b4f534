//! Command-line driver for the Blockade Labs generation workflow.
//!
//! Lists skybox styles and generator backends, submits generation jobs,
//! polls them to completion, and writes the resulting image to disk.

use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use tracing::info;

use skyforge::blockade::types::{GeneratorField, SkyboxStyleField};
use skyforge::workflow::{self, cancel_channel, CancelToken, GeneratedImage};
use skyforge::{settings, BlockadeClient, Settings};

const USAGE: &str = "\
Usage: skyforge <command> [args]

Commands:
  styles                              list skybox styles and their prompt fields
  generators                          list generator backends
  skybox <style-id> <key=value>...    generate a 360° skybox
  imagine <generator> <key=value>...  generate an image via a named backend

Options:
  --out <dir>    output directory for downloaded images (default: data dir)

The API key comes from settings.json in the data directory or the
BLOCKADE_API_KEY environment variable.";

#[tokio::main]
async fn main() -> Result<()> {
    // Log to stderr so stdout carries only command output.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let data_dir = settings::data_dir()?;
    std::fs::create_dir_all(&data_dir)?;
    let settings = Settings::load(&data_dir);
    info!(base_url = %settings.base_url, "loaded settings");

    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let out_dir = take_out_dir(&mut args)?.unwrap_or_else(|| data_dir.join("images"));

    let Some(command) = args.first().cloned() else {
        bail!("missing command\n\n{USAGE}");
    };

    let client = BlockadeClient::new(settings.base_url.clone(), settings.api_key.clone());
    let config = settings.workflow_config();

    match command.as_str() {
        "styles" => list_styles(&client).await,
        "generators" => list_generators(&client).await,
        "skybox" => {
            let style_id: i32 = args
                .get(1)
                .context("skybox requires a style id")?
                .parse()
                .context("style id must be an integer")?;
            let fields = parse_style_fields(&args[2..])?;
            let image = run_cancellable(|cancel| {
                workflow::run_skybox_generation(&client, &fields, style_id, &config, cancel)
            })
            .await?;
            save_image(&out_dir, "skybox", &image).await
        }
        "imagine" => {
            let generator = args
                .get(1)
                .context("imagine requires a generator name")?
                .clone();
            let fields = parse_generator_fields(&args[2..])?;
            let image = run_cancellable(|cancel| {
                workflow::run_imagine_generation(&client, &fields, &generator, &config, cancel)
            })
            .await?;
            save_image(&out_dir, "imagine", &image).await
        }
        other => bail!("unknown command {other:?}\n\n{USAGE}"),
    }
}

async fn list_styles(client: &BlockadeClient) -> Result<()> {
    let styles = client.get_skybox_styles().await?;
    for style in styles {
        println!("{:>5}  {}", style.id, style.name);
        for input in &style.user_inputs {
            println!("         {}  ({})", input.key, input.placeholder);
        }
    }
    Ok(())
}

async fn list_generators(client: &BlockadeClient) -> Result<()> {
    let generators = client.get_generators().await?;
    for backend in generators {
        println!("{}", backend.generator);
        for field in backend.fields() {
            let required = if field.required { "*" } else { "" };
            println!("    {}{}", field.key, required);
        }
    }
    Ok(())
}

/// Run a generation future with Ctrl-C mapped to workflow cancellation.
async fn run_cancellable<F, Fut>(start: F) -> Result<GeneratedImage>
where
    F: FnOnce(CancelToken) -> Fut,
    Fut: std::future::Future<Output = Result<GeneratedImage>>,
{
    let (handle, token) = cancel_channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("cancellation requested");
            handle.cancel();
        }
    });
    start(token).await
}

async fn save_image(out_dir: &PathBuf, kind: &str, image: &GeneratedImage) -> Result<()> {
    tokio::fs::create_dir_all(out_dir).await?;

    let stamp = chrono::Utc::now().format("%Y%m%d-%H%M%S");
    let filename = format!("{kind}-{stamp}-{}.png", uuid::Uuid::new_v4());
    let path = out_dir.join(&filename);
    tokio::fs::write(&path, &image.bytes).await?;

    info!(job_id = image.job_id, prompt = %image.prompt, "saved generated image");
    println!("{}", path.display());
    Ok(())
}

/// Strip a `--out <dir>` pair out of the argument list, if present.
fn take_out_dir(args: &mut Vec<String>) -> Result<Option<PathBuf>> {
    let Some(pos) = args.iter().position(|a| a == "--out") else {
        return Ok(None);
    };
    if pos + 1 >= args.len() {
        bail!("--out requires a directory argument\n\n{USAGE}");
    }
    args.remove(pos);
    Ok(Some(PathBuf::from(args.remove(pos))))
}

fn parse_style_fields(args: &[String]) -> Result<Vec<SkyboxStyleField>> {
    args.iter()
        .map(|arg| {
            let (key, value) = split_field(arg)?;
            Ok(SkyboxStyleField {
                key: key.to_string(),
                name: key.to_string(),
                value: value.to_string(),
            })
        })
        .collect()
}

fn parse_generator_fields(args: &[String]) -> Result<Vec<GeneratorField>> {
    args.iter()
        .map(|arg| {
            let (key, value) = split_field(arg)?;
            Ok(GeneratorField {
                key: key.to_string(),
                value: value.to_string(),
                required: false,
            })
        })
        .collect()
}

fn split_field(arg: &str) -> Result<(&str, &str)> {
    arg.split_once('=')
        .with_context(|| format!("field {arg:?} is not key=value"))
}
