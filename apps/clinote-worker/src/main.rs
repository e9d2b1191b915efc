use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = clinote_worker::Args::parse();

	clinote_worker::run(args).await
}
