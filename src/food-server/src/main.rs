use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;

use food_serve::ModelOpts;
use log::info;
use structopt::StructOpt;
use tokio::net::TcpListener;

mod routes;

use routes::AppState;

#[derive(StructOpt, Debug)]
#[structopt(
    name = "food-server",
    about = "HTTP front end serving food image classification"
)]
struct CmdArgs {
    #[structopt(flatten)]
    model: ModelOpts,

    #[structopt(long, env = "FOOD_PORT", default_value = "5000")]
    port: u16,

    #[structopt(help = "Pass `serve` to start the HTTP server once the model is loaded")]
    commands: Vec<String>,
}

impl CmdArgs {
    fn should_serve(&self) -> bool {
        self.commands.iter().any(|c| c == "serve")
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let args = CmdArgs::from_args();

    let classifier = food_serve::setup_classifier(&args.model).await?;

    if !args.should_serve() {
        info!("Model loaded, pass `serve` to start the server");
        return Ok(());
    }

    let app = routes::create_app(AppState {
        classifier: Arc::new(classifier),
        app_dir: args.model.app_dir.clone(),
    });

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    let listener = TcpListener::bind(addr).await?;
    info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}
