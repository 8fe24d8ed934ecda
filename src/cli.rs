use clap::Parser;

#[derive(Parser, Debug, Default)]
#[command(
    name = "ccstatus",
    version,
    about = "Render a status line from Claude Code session JSON on stdin"
)]
pub struct Cli {
    /// Show token breakdown (input/output/cache)
    #[arg(short = 'd', long)]
    pub token_breakdown: bool,

    /// Show context window usage percentage
    #[arg(short = 'c', long)]
    pub context_tokens: bool,

    /// Show session total token usage
    #[arg(short = 't', long)]
    pub session_tokens: bool,

    /// Show cache efficiency percentage
    #[arg(short = 'e', long)]
    pub cache_efficiency: bool,

    /// Show API time as percentage of total session time
    #[arg(short = 'p', long)]
    pub api_time_ratio: bool,

    /// Show lines added/removed ratio
    #[arg(short = 'l', long)]
    pub lines_ratio: bool,

    /// Show input/output token ratio
    #[arg(short = 'i', long)]
    pub input_output_ratio: bool,

    /// Show cache write/read ratio
    #[arg(short = 'w', long)]
    pub cache_write_read_ratio: bool,

    /// Clamp percentages at 100%
    #[arg(short = 'C', long)]
    pub clamping: bool,

    /// Show all metrics
    #[arg(short = 'a', long)]
    pub all: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Show labels for all fields
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Hide the token breakdown row
    #[arg(short = 'H', long)]
    pub hide_breakdown: bool,

    /// Show a simplified status line
    #[arg(short = 's', long)]
    pub simple: bool,
}

impl Cli {
    /// Whether any requested row requires the session-wide accumulation.
    pub fn needs_session_tokens(&self) -> bool {
        self.all
            || self.token_breakdown
            || self.session_tokens
            || self.cache_efficiency
            || self.input_output_ratio
            || self.cache_write_read_ratio
    }

    /// Whether any requested row requires the last-assistant context count.
    pub fn needs_context_tokens(&self) -> bool {
        self.all || self.context_tokens
    }

    pub fn show_token_breakdown(&self) -> bool {
        (self.all || self.token_breakdown) && !self.hide_breakdown
    }

    pub fn show_context_tokens(&self) -> bool {
        self.all || self.context_tokens
    }

    pub fn show_session_tokens(&self) -> bool {
        self.all || self.session_tokens
    }

    pub fn show_cache_efficiency(&self) -> bool {
        self.all || self.cache_efficiency
    }

    pub fn show_api_time_ratio(&self) -> bool {
        self.all || self.api_time_ratio
    }

    pub fn show_lines_ratio(&self) -> bool {
        self.all || self.lines_ratio
    }

    pub fn show_input_output_ratio(&self) -> bool {
        self.all || self.input_output_ratio
    }

    pub fn show_cache_write_read_ratio(&self) -> bool {
        self.all || self.cache_write_read_ratio
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_request_nothing() {
        let cli = Cli::parse_from(["ccstatus"]);
        assert!(!cli.needs_session_tokens());
        assert!(!cli.needs_context_tokens());
        assert!(!cli.show_api_time_ratio());
    }

    #[test]
    fn all_enables_every_row() {
        let cli = Cli::parse_from(["ccstatus", "-a"]);
        assert!(cli.needs_session_tokens());
        assert!(cli.needs_context_tokens());
        assert!(cli.show_token_breakdown());
        assert!(cli.show_context_tokens());
        assert!(cli.show_session_tokens());
        assert!(cli.show_cache_efficiency());
        assert!(cli.show_api_time_ratio());
        assert!(cli.show_lines_ratio());
        assert!(cli.show_input_output_ratio());
        assert!(cli.show_cache_write_read_ratio());
    }

    #[test]
    fn hide_breakdown_overrides_all() {
        let cli = Cli::parse_from(["ccstatus", "--all", "--hide-breakdown"]);
        assert!(!cli.show_token_breakdown());
        assert!(cli.show_session_tokens());
    }

    #[test]
    fn context_flag_does_not_pull_session_parsing() {
        let cli = Cli::parse_from(["ccstatus", "-c"]);
        assert!(cli.needs_context_tokens());
        assert!(!cli.needs_session_tokens());
    }

    #[test]
    fn session_rows_pull_session_parsing_only() {
        for flag in ["-d", "-t", "-e", "-i", "-w"] {
            let cli = Cli::parse_from(["ccstatus", flag]);
            assert!(cli.needs_session_tokens(), "flag {flag}");
            assert!(!cli.needs_context_tokens(), "flag {flag}");
        }
    }

    #[test]
    fn time_and_lines_rows_need_no_transcript() {
        let cli = Cli::parse_from(["ccstatus", "-p", "-l"]);
        assert!(cli.show_api_time_ratio());
        assert!(cli.show_lines_ratio());
        assert!(!cli.needs_session_tokens());
        assert!(!cli.needs_context_tokens());
    }

    #[test]
    fn long_flags_parse() {
        let cli = Cli::parse_from([
            "ccstatus",
            "--token-breakdown",
            "--clamping",
            "--no-color",
            "--verbose",
            "--simple",
        ]);
        assert!(cli.token_breakdown);
        assert!(cli.clamping);
        assert!(cli.no_color);
        assert!(cli.verbose);
        assert!(cli.simple);
    }
}
