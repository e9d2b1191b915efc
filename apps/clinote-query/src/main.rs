use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = clinote_query::Args::parse();

	clinote_query::run(args).await
}
