use clap::Parser;

/// Ingests missing-person reports from the safe182 listing and streams new ones to subscribers.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Log formatter to use
    #[arg(long, value_enum, default_value_t = default_tracing_format())]
    pub tracing: TracingFormat,

    /// Run a single ingestion pass and exit
    #[arg(long)]
    pub once: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum TracingFormat {
    /// Human-readable output for local development
    Pretty,
    /// Structured output for log aggregation
    Json,
}

const fn default_tracing_format() -> TracingFormat {
    if cfg!(debug_assertions) {
        TracingFormat::Pretty
    } else {
        TracingFormat::Json
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flags() {
        let args = Args::try_parse_from(["beacon", "--tracing", "json", "--once"]).unwrap();
        assert_eq!(args.tracing, TracingFormat::Json);
        assert!(args.once);
    }

    #[test]
    fn test_rejects_unknown_format() {
        assert!(Args::try_parse_from(["beacon", "--tracing", "xml"]).is_err());
    }
}
