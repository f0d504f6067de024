//! CLI for AdCraft - ad campaigns from a product photo.

use adcraft::generator::MAX_IDEA_COUNT;
use adcraft::key::DEFAULT_KEY_VARS;
use adcraft::{AdCampaign, AdGenerator, ConceptModel, ImageModel, Locale, Stage, Upload};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "adcraft")]
#[command(about = "Generate advertising images and ad copy from a product photo (Gemini)")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate an ad campaign from a product image
    Generate(GenerateArgs),

    /// List available models and API key variables
    Models,
}

#[derive(Args)]
struct GenerateArgs {
    /// Product image (PNG, JPEG or WebP)
    image: PathBuf,

    /// Directory to write generated images into
    #[arg(short, long, default_value = ".")]
    output: PathBuf,

    /// Number of campaign ideas to request (1-10)
    #[arg(short = 'n', long, default_value_t = 6)]
    ideas: usize,

    /// Per-image timeout in seconds
    #[arg(long, default_value_t = 120)]
    timeout: u64,

    /// Language of the ad copy and messages
    #[arg(long, value_enum, default_value = "ar")]
    lang: LangArg,

    /// Use the higher quality (slower) models
    #[arg(long)]
    pro: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LangArg {
    Ar,
    En,
}

impl From<LangArg> for Locale {
    fn from(arg: LangArg) -> Self {
        match arg {
            LangArg::Ar => Locale::Arabic,
            LangArg::En => Locale::English,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Generate(args) => {
            let locale = Locale::from(args.lang);
            if let Err(e) = generate(args, cli.json).await {
                match e.downcast_ref::<adcraft::AdCraftError>() {
                    Some(err) => eprintln!("{}", err.user_message(locale)),
                    None => eprintln!("error: {e:#}"),
                }
                std::process::exit(1);
            }
        }
        Commands::Models => {
            list_models(cli.json)?;
        }
    }

    Ok(())
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_env("ADCRAFT_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn validate_generate_args(args: &GenerateArgs) -> anyhow::Result<()> {
    if !(1..=MAX_IDEA_COUNT).contains(&args.ideas) {
        anyhow::bail!("--ideas must be between 1 and {MAX_IDEA_COUNT}");
    }
    if args.timeout == 0 {
        anyhow::bail!("--timeout must be at least 1 second");
    }
    Ok(())
}

async fn generate(args: GenerateArgs, json_output: bool) -> anyhow::Result<()> {
    validate_generate_args(&args)?;

    let mut builder = AdGenerator::builder()
        .idea_count(args.ideas)
        .attempt_timeout(Duration::from_secs(args.timeout))
        .locale(args.lang.into());
    if args.pro {
        builder = builder
            .concept_model(ConceptModel::Pro)
            .image_model(ImageModel::NanoBananaPro);
    }
    let generator = builder.build()?;

    let campaign = generator
        .run_with_progress(Upload::Path(args.image.clone()), |stage| {
            if !json_output {
                if let Some(msg) = stage_message(stage) {
                    eprintln!("{msg}");
                }
            }
        })
        .await?;

    std::fs::create_dir_all(&args.output)?;
    let saved = save_images(&campaign, &args.output)?;

    if json_output {
        print_json(&campaign, &saved)?;
    } else {
        print_summary(&campaign, &saved);
    }

    Ok(())
}

fn stage_message(stage: Stage) -> Option<&'static str> {
    match stage {
        Stage::Encoding => Some("Reading product image..."),
        Stage::ConceptsPending => Some("Analysing product and writing ad concepts..."),
        Stage::ImagesPending => Some("Generating ad images..."),
        _ => None,
    }
}

fn save_images(campaign: &AdCampaign, dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut saved = Vec::with_capacity(campaign.images.len());
    for image in &campaign.images {
        let path = dir.join(image.file_name());
        std::fs::write(&path, image.decode()?)?;
        saved.push(path);
    }
    Ok(saved)
}

fn print_json(campaign: &AdCampaign, saved: &[PathBuf]) -> anyhow::Result<()> {
    let ideas: Vec<_> = campaign
        .ideas
        .iter()
        .enumerate()
        .map(|(i, idea)| {
            let output = campaign
                .images
                .iter()
                .position(|img| img.idea_index == i)
                .map(|pos| saved[pos].display().to_string());
            serde_json::json!({
                "title": idea.title,
                "description": idea.description,
                "image_prompt": idea.image_prompt,
                "output": output,
            })
        })
        .collect();

    let result = serde_json::json!({
        "success": true,
        "status": campaign.status(),
        "requested": campaign.ideas.len(),
        "succeeded": campaign.images.len(),
        "failed": campaign.failures.len(),
        "ideas": ideas,
        "errors": campaign.failures.iter().map(|f| f.to_string()).collect::<Vec<_>>(),
    });
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn print_summary(campaign: &AdCampaign, saved: &[PathBuf]) {
    println!(
        "Generated {} of {} ad images\n",
        campaign.images.len(),
        campaign.ideas.len()
    );
    for (i, idea) in campaign.ideas.iter().enumerate() {
        println!("{}. {}", i + 1, idea.title);
        println!("   {}", idea.description);
        match campaign.images.iter().position(|img| img.idea_index == i) {
            Some(pos) => println!("   -> {}", saved[pos].display()),
            None => println!("   -> (no image)"),
        }
        println!();
    }
}

fn list_models(json_output: bool) -> anyhow::Result<()> {
    #[derive(serde::Serialize)]
    struct ModelInfo {
        stage: &'static str,
        model: String,
        default: bool,
    }

    let models = vec![
        ModelInfo {
            stage: "concepts",
            model: ConceptModel::Flash.as_str().to_string(),
            default: true,
        },
        ModelInfo {
            stage: "concepts",
            model: ConceptModel::Pro.as_str().to_string(),
            default: false,
        },
        ModelInfo {
            stage: "images",
            model: ImageModel::NanoBanana.as_str().to_string(),
            default: true,
        },
        ModelInfo {
            stage: "images",
            model: ImageModel::NanoBananaPro.as_str().to_string(),
            default: false,
        },
    ];

    if json_output {
        let result = serde_json::json!({
            "models": models,
            "api_key_env": DEFAULT_KEY_VARS,
        });
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("Models:\n");
        for m in &models {
            let marker = if m.default { "*" } else { " " };
            println!("  {} {:<9} {}", marker, m.stage, m.model);
        }
        println!("\nAPI key (first set wins): {}", DEFAULT_KEY_VARS.join(", "));
        println!("  (* default, --pro selects the others)");
    }

    Ok(())
}
