use std::error::Error;
use std::path::PathBuf;

use food_serve::{Classify, ModelOpts};
use log::info;
use structopt::StructOpt;

#[derive(StructOpt, Debug)]
#[structopt(
    name = "food-classify",
    about = "CLI app to classify a food image with the served model"
)]
struct CmdArgs {
    #[structopt(flatten)]
    model: ModelOpts,

    #[structopt(parse(from_os_str), help = "Image file to classify")]
    image: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let args = CmdArgs::from_args();

    let classifier = food_serve::setup_classifier(&args.model).await?;

    let data = std::fs::read(&args.image)?;
    let classification = classifier.classify_from_raw(&data)?;

    info!("{} -> {}", args.image.display(), classification.tag);
    println!("{}", serde_json::to_string(&classification)?);

    Ok(())
}
