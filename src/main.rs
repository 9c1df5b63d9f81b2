use anyhow::Result;

use flowgrid::{app, bench};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("flowgrid=info".parse()?),
        )
        .init();

    if let Some(args) = bench::maybe_parse_args()? {
        let code = bench::run_benchmark(args)?;
        std::process::exit(code);
    }

    let args = app::parse_args(std::env::args().skip(1))?;
    let code = app::run(args)?;
    std::process::exit(code);
}
