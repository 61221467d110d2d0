//! Progress bars for long-running commands

use anyhow::Result;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::io::IsTerminal;

/// Bar counting contracted vertices, drawn on stderr
///
/// Hidden when stderr is not a terminal so logs and piped output stay clean.
pub fn contraction_bar(total: u64) -> Result<ProgressBar> {
    let bar = ProgressBar::with_draw_target(Some(total), draw_target());
    bar.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} vertices ({percent}%) {msg} ETA: {eta}",
            )?
            .progress_chars("#>-"),
    );
    Ok(bar)
}

/// Spinner for steps without a known length (loading, parsing)
pub fn spinner(message: &str) -> Result<ProgressBar> {
    let bar = ProgressBar::with_draw_target(None, draw_target());
    bar.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg} [{elapsed}]")?);
    bar.set_message(message.to_string());
    Ok(bar)
}

fn draw_target() -> ProgressDrawTarget {
    if std::io::stderr().is_terminal() {
        ProgressDrawTarget::stderr()
    } else {
        ProgressDrawTarget::hidden()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contraction_bar_template() {
        let bar = contraction_bar(1000).unwrap();
        assert_eq!(bar.length(), Some(1000));
        bar.set_position(100);
        bar.finish();
    }

    #[test]
    fn test_spinner_has_no_length() {
        let bar = spinner("loading").unwrap();
        assert_eq!(bar.length(), None);
        bar.finish_and_clear();
    }
}
