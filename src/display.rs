//! Status line and metric row rendering.
//!
//! Rows are produced as strings so the orchestration layer decides what to
//! print; a `None` row is hidden (all of its inputs were zero). Colors come
//! from a semantic theme struct with a no-color twin, so disabling color is
//! a theme swap rather than conditional formatting.

use crate::input::{StatusInput, UNKNOWN_VALUE};
use crate::numeric;
use crate::tokens::{self, DEFAULT_TOKEN_LIMIT, TokenCounts};

pub const PROGRESS_BAR_WIDTH: u32 = 20;
const BAR_FILLED: &str = "█";
const BAR_EMPTY: &str = "░";

// ANSI 256-color escapes, Monokai palette.
const ANSI_RED: &str = "\x1b[1m\x1b[38;5;197m";
const ANSI_RED_MUTED: &str = "\x1b[1m\x1b[38;5;161m";
const ANSI_GREEN: &str = "\x1b[1m\x1b[38;5;148m";
const ANSI_CYAN: &str = "\x1b[1m\x1b[38;5;81m";
const ANSI_DARK_CYAN: &str = "\x1b[1m\x1b[38;5;68m";
const ANSI_YELLOW: &str = "\x1b[1m\x1b[38;5;186m";
const ANSI_DARK_YELLOW: &str = "\x1b[1m\x1b[38;5;179m";
const ANSI_PURPLE: &str = "\x1b[1m\x1b[38;5;141m";
const ANSI_LIGHT_PURPLE: &str = "\x1b[1m\x1b[38;5;104m";
const ANSI_ORANGE: &str = "\x1b[1m\x1b[38;5;208m";
const ANSI_ORCHID: &str = "\x1b[1m\x1b[38;5;176m";
const ANSI_ORCHID_SOFT: &str = "\x1b[1m\x1b[38;5;139m";
const ANSI_LAVENDER: &str = "\x1b[1m\x1b[38;5;189m";
const ANSI_STEEL_BLUE: &str = "\x1b[1m\x1b[38;5;60m";
const ANSI_CTX_EMPTY: &str = "\x1b[1m\x1b[38;5;233m";
const ANSI_RESET: &str = "\x1b[0m";

/// Semantic color assignments for every UI element.
#[derive(Debug)]
pub struct Theme {
    pub label: &'static str,
    pub model_name: &'static str,
    pub model_id: &'static str,
    pub version: &'static str,
    pub dir: &'static str,
    pub cost: &'static str,
    pub time_total: &'static str,
    pub time_api: &'static str,
    pub lines_added: &'static str,
    pub lines_removed: &'static str,
    pub badge_under: &'static str,
    pub badge_over: &'static str,
    pub token_input: &'static str,
    pub token_output: &'static str,
    pub token_cache_create: &'static str,
    pub token_cache_read: &'static str,
    pub progress_empty: &'static str,
    pub progress_ctx: &'static str,
    pub progress_ses: &'static str,
    pub progress_cache: &'static str,
    pub progress_api_time: &'static str,
    pub reset: &'static str,
}

pub static THEME_COLOR: Theme = Theme {
    label: ANSI_RESET,
    model_name: ANSI_PURPLE,
    model_id: ANSI_LIGHT_PURPLE,
    version: ANSI_ORANGE,
    dir: ANSI_CYAN,
    cost: ANSI_YELLOW,
    time_total: ANSI_ORCHID,
    time_api: ANSI_LAVENDER,
    lines_added: ANSI_GREEN,
    lines_removed: ANSI_RED_MUTED,
    badge_under: ANSI_GREEN,
    badge_over: ANSI_RED,
    token_input: ANSI_CYAN,
    token_output: ANSI_DARK_CYAN,
    token_cache_create: ANSI_YELLOW,
    token_cache_read: ANSI_DARK_YELLOW,
    progress_empty: ANSI_CTX_EMPTY,
    progress_ctx: ANSI_STEEL_BLUE,
    progress_ses: ANSI_LIGHT_PURPLE,
    progress_cache: ANSI_ORCHID_SOFT,
    progress_api_time: ANSI_STEEL_BLUE,
    reset: ANSI_RESET,
};

pub static THEME_NONE: Theme = Theme {
    label: "",
    model_name: "",
    model_id: "",
    version: "",
    dir: "",
    cost: "",
    time_total: "",
    time_api: "",
    lines_added: "",
    lines_removed: "",
    badge_under: "",
    badge_over: "",
    token_input: "",
    token_output: "",
    token_cache_create: "",
    token_cache_read: "",
    progress_empty: "",
    progress_ctx: "",
    progress_ses: "",
    progress_cache: "",
    progress_api_time: "",
    reset: "",
};

pub fn theme(use_color: bool) -> &'static Theme {
    if use_color { &THEME_COLOR } else { &THEME_NONE }
}

/// Basename of a path for compact display. Trailing slashes are ignored,
/// the root stays "/", and an empty path shows the unknown placeholder.
pub fn extract_basename(path: &str) -> &str {
    if path.is_empty() {
        return UNKNOWN_VALUE;
    }
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return "/";
    }
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

fn progress_bar(theme: &Theme, percentage: u32, clamp: bool, bar_color: &str) -> String {
    let display_pct = if clamp && percentage > 100 { 100 } else { percentage };
    let filled = ((display_pct * PROGRESS_BAR_WIDTH) / 100).min(PROGRESS_BAR_WIDTH);

    let mut bar = format!("{}[{}", theme.reset, bar_color);
    for cell in 0..PROGRESS_BAR_WIDTH {
        if cell < filled {
            bar.push_str(BAR_FILLED);
        } else {
            bar.push_str(theme.progress_empty);
            bar.push_str(BAR_EMPTY);
        }
    }
    bar.push_str(theme.reset);
    bar.push(']');
    bar
}

/// Two-color bar split proportionally between `left` and `right`.
fn split_bar(theme: &Theme, left_color: &str, right_color: &str, left_width: u32) -> String {
    let left_width = left_width.min(PROGRESS_BAR_WIDTH);
    let mut bar = format!("{}[{}", theme.reset, left_color);
    for _ in 0..left_width {
        bar.push_str(BAR_FILLED);
    }
    bar.push_str(right_color);
    for _ in left_width..PROGRESS_BAR_WIDTH {
        bar.push_str(BAR_FILLED);
    }
    bar.push_str(theme.reset);
    bar.push(']');
    bar
}

/// Left share of a two-part ratio, scaled to `scale` (100 for percent,
/// bar width for cells). Saturates instead of failing on extreme inputs.
fn ratio_share(left: u64, total: u64, scale: u32) -> u32 {
    if total == 0 {
        return 0;
    }
    match numeric::mul_u64(left, u64::from(scale)) {
        Ok(product) => ((product / total).min(u64::from(scale))) as u32,
        Err(_) => scale,
    }
}

pub fn status_line(theme: &Theme, verbose: bool, simple: bool, status: &StatusInput) -> String {
    let r = theme.reset;
    let model_name = status.model_name_display();
    let model_id = status.model_id_display();
    let version = status.version_display();
    let cost = status.cost_display();

    let cwd_display = status
        .cwd
        .as_deref()
        .map_or(UNKNOWN_VALUE, extract_basename);
    let proj_display = status
        .project_dir
        .as_deref()
        .map_or(UNKNOWN_VALUE, extract_basename);

    if simple {
        return if verbose {
            format!(
                "{r}{r}Model:{r} {}{model_name}{r} ({}{model_id}{r}) {r}|{r} {r}Version:{r} {}{version}{r} {r}|{r} {r}Cost:{r} {}${cost:.4}{r} {r}|{r} {r}Directory:{r} {}{cwd_display}{r}",
                theme.model_name, theme.model_id, theme.version, theme.cost, theme.dir
            )
        } else {
            format!(
                "{r}{}{model_name}{r} ({}{model_id}{r}) | {}{version}{r} | {}${cost:.4}{r} | {}{cwd_display}{r}",
                theme.model_name, theme.model_id, theme.version, theme.cost, theme.dir
            )
        };
    }

    let dur_s = f64::from(status.duration_ms) / 1000.0;
    let api_s = f64::from(status.api_ms) / 1000.0;
    let added = status.lines_added;
    let removed = status.lines_removed;

    let (badge, badge_color) = if status.exceeds_200k_tokens {
        (">200k", theme.badge_over)
    } else {
        ("<200k", theme.badge_under)
    };

    // Extended layout shows the project directory separately when it
    // differs from the working directory.
    let project_part = if cwd_display == proj_display {
        String::new()
    } else if verbose {
        format!("{r}Project:{r} {}{proj_display}{r} {r}|{r} ", theme.dir)
    } else {
        format!("{}{proj_display}{r} | ", theme.dir)
    };

    if verbose {
        format!(
            "{r}{r}Model:{r} {}{model_name}{r} ({}{model_id}{r}) {r}|{r} {r}Version:{r} {}{version}{r} {r}|{r} {r}Directory:{r} {}{cwd_display}{r} {r}|{r} {project_part}{r}Cost:{r} {}${cost:.4}{r} {r}Tokens:{r} {badge_color}{badge}{r} {r}|{r} {r}Total:{r} {}{dur_s:.1}s{r} {r}API:{r} {}{api_s:.1}s{r} {r}|{r} {r}Lines:{r} {}+{added}{r}/{}-{removed}{r}",
            theme.model_name,
            theme.model_id,
            theme.version,
            theme.dir,
            theme.cost,
            theme.time_total,
            theme.time_api,
            theme.lines_added,
            theme.lines_removed
        )
    } else {
        format!(
            "{r}{}{model_name}{r} ({}{model_id}{r}) | {}{version}{r} | {}{cwd_display}{r} | {project_part}{}${cost:.4}{r} {badge_color}{badge}{r} | {}{dur_s:.1}s{r} {}{api_s:.1}s{r} | {}+{added}{r}/{}-{removed}{r}",
            theme.model_name,
            theme.model_id,
            theme.version,
            theme.dir,
            theme.cost,
            theme.time_total,
            theme.time_api,
            theme.lines_added,
            theme.lines_removed
        )
    }
}

pub fn token_breakdown(theme: &Theme, verbose: bool, tokens: &TokenCounts) -> Option<String> {
    if tokens.is_zero() {
        return None;
    }

    let r = theme.reset;
    let input = tokens::format_tokens(tokens.input);
    let output = tokens::format_tokens(tokens.output);
    let created = tokens::format_tokens(tokens.cache_creation);
    let read = tokens::format_tokens(tokens.cache_read);

    Some(if verbose {
        format!(
            "{r}Input: {}{input}{r}  Output: {}{output}{r}  Cache Write: {}{created}{r}  Cache Read: {}{read}{r}",
            theme.token_input, theme.token_output, theme.token_cache_create, theme.token_cache_read
        )
    } else {
        format!(
            "{r}In: {}{input}{r}  Out: {}{output}{r}  CaWr: {}{created}{r}  CaRd: {}{read}{r}",
            theme.token_input, theme.token_output, theme.token_cache_create, theme.token_cache_read
        )
    })
}

pub fn context_row(theme: &Theme, verbose: bool, context_tokens: u64, clamp: bool) -> String {
    let percentage = tokens::calculate_percentage(context_tokens, DEFAULT_TOKEN_LIMIT, clamp);
    let used = tokens::format_tokens(context_tokens);
    let limit = tokens::format_tokens(DEFAULT_TOKEN_LIMIT);
    let bar = progress_bar(theme, percentage, clamp, theme.progress_ctx);

    if verbose {
        format!(
            "{}Context   {bar} {percentage:7}% ({used} used / {limit} limit)",
            theme.reset
        )
    } else {
        format!("{}Ctx{} {bar} {used}", theme.label, theme.reset)
    }
}

pub fn session_row(
    theme: &Theme,
    verbose: bool,
    total_tokens: u64,
    clamp: bool,
) -> Option<String> {
    if total_tokens == 0 {
        return None;
    }

    let percentage = tokens::calculate_percentage(total_tokens, DEFAULT_TOKEN_LIMIT, clamp);
    let used = tokens::format_tokens(total_tokens);
    let limit = tokens::format_tokens(DEFAULT_TOKEN_LIMIT);
    let bar = progress_bar(theme, percentage, clamp, theme.progress_ses);

    Some(if verbose {
        format!(
            "{}Session   {bar} {percentage:7}% ({used} used / {limit} limit)",
            theme.reset
        )
    } else {
        format!("{}Ses{} {bar} {used}", theme.label, theme.reset)
    })
}

pub fn cache_efficiency_row(theme: &Theme, verbose: bool, tokens: &TokenCounts) -> Option<String> {
    let cache_read = tokens.cache_read;
    let cache_total =
        numeric::add_u64(cache_read, tokens.cache_creation).unwrap_or(u64::MAX);
    if cache_total == 0 {
        return None;
    }

    let percentage = ratio_share(cache_read, cache_total, 100);
    let read = tokens::format_tokens(cache_read);
    let total = tokens::format_tokens(cache_total);
    let bar = progress_bar(theme, percentage, false, theme.progress_cache);

    Some(if verbose {
        format!(
            "{}Cache     {bar} {percentage:7}% ({read} read / {total} total)",
            theme.reset
        )
    } else {
        format!("{}Cef{} {bar} {read}/{total}", theme.label, theme.reset)
    })
}

pub fn api_time_row(theme: &Theme, verbose: bool, api_ms: u32, total_ms: u32) -> String {
    let percentage = if total_ms > 0 {
        ((u64::from(api_ms) * 100 / u64::from(total_ms)) as u32).min(100)
    } else {
        0
    };
    let api_s = f64::from(api_ms) / 1000.0;
    let total_s = f64::from(total_ms) / 1000.0;
    let bar = progress_bar(theme, percentage, false, theme.progress_api_time);

    if verbose {
        format!(
            "{}API Time  {bar} {percentage:7}% ({api_s:.1}s API / {total_s:.1}s total)",
            theme.reset
        )
    } else {
        format!(
            "{}API{} {bar} {api_s:.1}s/{total_s:.1}s",
            theme.label, theme.reset
        )
    }
}

pub fn lines_row(theme: &Theme, verbose: bool, added: u32, removed: u32) -> Option<String> {
    let total = numeric::add_u32(added, removed).unwrap_or(u32::MAX);
    if total == 0 {
        return None;
    }

    let added_pct = ratio_share(u64::from(added), u64::from(total), 100);
    let removed_pct = 100 - added_pct;
    let added_width = ratio_share(u64::from(added), u64::from(total), PROGRESS_BAR_WIDTH);
    let bar = split_bar(theme, theme.lines_added, theme.lines_removed, added_width);

    Some(if verbose {
        format!(
            "{}Lines     {bar} {added_pct:3}%/{removed_pct}% ({added} added / {removed} removed)",
            theme.reset
        )
    } else {
        format!(
            "{}Lin{} {bar} +{added}/-{removed}",
            theme.label, theme.reset
        )
    })
}

pub fn input_output_row(theme: &Theme, verbose: bool, tokens: &TokenCounts) -> Option<String> {
    let total = numeric::add_u64(tokens.input, tokens.output).unwrap_or(u64::MAX);
    if total == 0 {
        return None;
    }

    let input_pct = ratio_share(tokens.input, total, 100).min(100);
    let output_pct = 100 - input_pct;
    let input_width = ratio_share(tokens.input, total, PROGRESS_BAR_WIDTH);
    let bar = split_bar(theme, theme.token_input, theme.token_output, input_width);
    let input = tokens::format_tokens(tokens.input);
    let output = tokens::format_tokens(tokens.output);

    Some(if verbose {
        format!(
            "{}Tokens IO {bar} {input_pct:3}%/{output_pct}% ({input} input / {output} output)",
            theme.reset
        )
    } else {
        format!("{}TIO{} {bar} {input}/{output}", theme.label, theme.reset)
    })
}

pub fn cache_write_read_row(theme: &Theme, verbose: bool, tokens: &TokenCounts) -> Option<String> {
    let total = numeric::add_u64(tokens.cache_creation, tokens.cache_read).unwrap_or(u64::MAX);
    if total == 0 {
        return None;
    }

    let write_pct = ratio_share(tokens.cache_creation, total, 100).min(100);
    let read_pct = 100 - write_pct;
    let write_width = ratio_share(tokens.cache_creation, total, PROGRESS_BAR_WIDTH);
    let bar = split_bar(
        theme,
        theme.token_cache_create,
        theme.token_cache_read,
        write_width,
    );
    let write = tokens::format_tokens(tokens.cache_creation);
    let read = tokens::format_tokens(tokens.cache_read);

    Some(if verbose {
        format!(
            "{}Cache RW  {bar} {write_pct:3}%/{read_pct}% ({write} write / {read} read)",
            theme.reset
        )
    } else {
        format!("{}CWR{} {bar} {write}/{read}", theme.label, theme.reset)
    })
}
