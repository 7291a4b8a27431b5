// ABOUTME: Main application orchestration for the ticketflow CLI
// ABOUTME: Coordinates between CLI arguments, configuration, logging, and command execution

use anyhow::Result;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use super::commands;
use super::{Args, Commands, Config};

pub struct App {
    config: Config,
}

impl App {
    /// Create a new application instance
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Initialize logging based on configuration
    pub fn init_logging(&self, verbose: bool, no_color: bool, format: Option<&str>) -> Result<()> {
        let log_level = if verbose {
            "debug"
        } else {
            &self.config.logging.level
        };

        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

        // Logs go to stderr so stdout carries only output records
        let result = match format.unwrap_or(&self.config.logging.format) {
            "compact" => tracing_subscriber::fmt()
                .compact()
                .with_env_filter(env_filter)
                .with_ansi(!no_color)
                .with_target(false)
                .with_writer(std::io::stderr)
                .try_init(),
            _ => tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_ansi(!no_color)
                .with_target(false)
                .with_writer(std::io::stderr)
                .try_init(),
        };
        result.map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

        debug!("Logging initialized with level: {}", log_level);
        Ok(())
    }

    /// Run the application with parsed arguments
    pub async fn run(&mut self, args: Args) -> Result<()> {
        self.init_logging(args.verbose, args.no_color, args.log_format.as_deref())?;

        info!("Starting ticketflow v{}", crate::VERSION);
        debug!("Configuration loaded from: {:?}", args.config);

        match args.command {
            Commands::Run {
                tickets,
                output,
                per_ticket,
                format,
                max_concurrent,
                timeout,
                strict,
            } => {
                commands::run_tickets(
                    tickets,
                    output,
                    per_ticket,
                    format,
                    max_concurrent,
                    timeout,
                    strict,
                    &self.config,
                )
                .await
            }

            Commands::Demo { scenario, format } => {
                commands::run_demo(scenario, format, &self.config).await
            }

            Commands::Validate { tickets } => {
                commands::validate_tickets(tickets, &self.config).await
            }

            Commands::Stages => commands::list_stages(&self.config),
        }
    }

    /// Parse command line arguments and load the configuration they point at
    pub fn from_args() -> Result<(Self, Args)> {
        let args = Args::parse_args();
        let config = Config::load(args.config.clone())?;
        Ok((Self::new(config), args))
    }
}
