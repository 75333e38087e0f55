use shared::preferences::Preferences;
use shared::settings::{
    CONTEXT_HELP, CONTEXT_LABEL, SETTINGS_TITLE, SPICYNESS_HELP, SPICYNESS_LABEL, SPICYNESS_SLIDER,
};
use shared::spicyness::Spicyness;
use shared::transcript::{ChatMessage, Speaker, Transcript};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

pub const TITLE: &str = "Conspire with Koala 🐨";
pub const HEADLINE: &str = "Let's Conspire Together!";
pub const SETTINGS_COMMANDS: &str = "context <text> | spicyness <0-2> | + | - | save | close";

const BUBBLE_WIDTH_PERCENT: usize = 75;
const BUBBLE_CHROME: usize = 4;
const MIN_VIEWPORT_WIDTH: usize = 12;
const TOP_BAR_HEIGHT: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: usize,
    pub height: usize,
}

impl Viewport {
    fn content_height(self) -> usize {
        self.height.saturating_sub(TOP_BAR_HEIGHT).max(1)
    }

    fn clamped_width(self) -> usize {
        self.width.max(MIN_VIEWPORT_WIDTH)
    }
}

/// Renders the fixed top bar followed by the visible part of the content
/// area. `scroll_offset` counts lines back from the newest content; 0 pins the
/// view to the bottom.
pub fn render(transcript: &Transcript, viewport: Viewport, scroll_offset: usize) -> Vec<String> {
    let width = viewport.clamped_width();
    let content_height = viewport.content_height();
    let content = content_lines(transcript, width);

    let offset = scroll_offset.min(content.len().saturating_sub(content_height));
    let end = content.len() - offset;
    let start = end.saturating_sub(content_height);

    let mut lines = top_bar(width);
    lines.extend(content.into_iter().skip(start).take(end - start));
    lines
}

/// Largest useful scroll offset for the current transcript and viewport.
pub fn max_scroll_offset(transcript: &Transcript, viewport: Viewport) -> usize {
    content_lines(transcript, viewport.clamped_width())
        .len()
        .saturating_sub(viewport.content_height())
}

/// Renders the settings dialog for the live preferences, with an optional
/// notice line (e.g. a failed save) under the controls.
pub fn render_settings(
    preferences: &Preferences,
    viewport: Viewport,
    notice: Option<&str>,
) -> Vec<String> {
    let width = viewport.clamped_width();
    let help_width = width.saturating_sub(2);
    let context = if preferences.context.is_empty() {
        "(none)"
    } else {
        preferences.context.as_str()
    };

    let mut lines = top_bar(width);
    lines.push(String::new());
    lines.push(SETTINGS_TITLE.to_string());
    lines.push(String::new());
    lines.push(CONTEXT_LABEL.to_string());
    lines.extend(indented(context, help_width));
    lines.extend(indented(CONTEXT_HELP, help_width));
    lines.push(String::new());
    lines.push(format!("{SPICYNESS_LABEL} {}", preferences.spicyness));
    lines.push(format!("  {}", slider_bar(preferences.spicyness)));
    lines.push(format!("  marks: {}", slider_marks()));
    lines.extend(indented(SPICYNESS_HELP, help_width));
    lines.push(String::new());
    if let Some(notice) = notice {
        lines.push(notice.to_string());
    }
    lines.push(SETTINGS_COMMANDS.to_string());
    lines
}

/// One cell per slider step, with the knob on the current value.
fn slider_bar(spicyness: Spicyness) -> String {
    let slider = SPICYNESS_SLIDER;
    let steps = ((slider.max - slider.min) / slider.step).round() as usize;
    let knob = ((spicyness.value() - slider.min) / slider.step).round() as usize;
    let cells = (0..=steps)
        .map(|cell| if cell == knob { '●' } else { '─' })
        .collect::<String>();
    format!("{} [{cells}] {}", slider.min, slider.max)
}

fn indented(text: &str, width: usize) -> impl Iterator<Item = String> {
    wrap(text, width).into_iter().map(|line| format!("  {line}"))
}

fn slider_marks() -> String {
    SPICYNESS_SLIDER
        .marks
        .iter()
        .map(|mark| mark.label)
        .collect::<Vec<_>>()
        .join(" ")
}

fn top_bar(width: usize) -> Vec<String> {
    vec![center(TITLE, width), "─".repeat(width)]
}

fn content_lines(transcript: &Transcript, width: usize) -> Vec<String> {
    let mut lines = vec![String::new(), center(HEADLINE, width), String::new()];
    for (index, message) in transcript.messages().iter().enumerate() {
        if index > 0 {
            lines.push(String::new());
        }
        lines.extend(bubble(message, width));
    }
    lines
}

fn bubble(message: &ChatMessage, width: usize) -> Vec<String> {
    let max_outer = (width * BUBBLE_WIDTH_PERCENT / 100).max(BUBBLE_CHROME + 1);
    let wrapped = wrap(&message.text, max_outer - BUBBLE_CHROME);
    let inner = wrapped
        .iter()
        .map(|line| line.width())
        .max()
        .unwrap_or(0);
    let outer = inner + BUBBLE_CHROME;

    let label = message.speaker.label();
    let (indent, label_line) = match message.speaker {
        Speaker::User => (
            width.saturating_sub(outer),
            format!(
                "{}{label}",
                " ".repeat(width.saturating_sub(label.width()))
            ),
        ),
        Speaker::Assistant => (0, label.to_string()),
    };
    let pad = " ".repeat(indent);

    let mut lines = Vec::with_capacity(wrapped.len() + 3);
    lines.push(label_line);
    lines.push(format!("{pad}╭{}╮", "─".repeat(inner + 2)));
    for line in wrapped {
        let fill = " ".repeat(inner.saturating_sub(line.width()));
        lines.push(format!("{pad}│ {line}{fill} │"));
    }
    lines.push(format!("{pad}╰{}╯", "─".repeat(inner + 2)));
    lines
}

fn center(text: &str, width: usize) -> String {
    let pad = width.saturating_sub(text.width()) / 2;
    format!("{}{text}", " ".repeat(pad))
}

/// Word wraps `text` to `width` terminal columns. Explicit newlines are kept
/// and words longer than a line are split.
fn wrap(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();

    for paragraph in text.split('\n') {
        let mut current = String::new();
        let mut current_len = 0;

        for word in paragraph.split_whitespace() {
            let mut rest = word;
            while !rest.is_empty() {
                let rest_len = rest.width();
                let needed = if current_len == 0 {
                    rest_len
                } else {
                    current_len + 1 + rest_len
                };

                if needed <= width {
                    if current_len > 0 {
                        current.push(' ');
                        current_len += 1;
                    }
                    current.push_str(rest);
                    current_len += rest_len;
                    break;
                }

                if current_len > 0 {
                    lines.push(std::mem::take(&mut current));
                    current_len = 0;
                    continue;
                }

                let split_at = split_at_width(rest, width);
                lines.push(rest[..split_at].to_string());
                rest = &rest[split_at..];
            }
        }

        lines.push(current);
    }

    lines
}

/// Byte index of the longest prefix of `word` that fits in `width` columns.
/// Always takes at least one character so wrapping makes progress.
fn split_at_width(word: &str, width: usize) -> usize {
    let mut used = 0;
    for (index, ch) in word.char_indices() {
        let ch_width = ch.width().unwrap_or(0);
        if index > 0 && used + ch_width > width {
            return index;
        }
        used += ch_width;
    }
    word.len()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use shared::conversation::ConversationController;
    use shared::llm::CompletionChunk;
    use shared::preferences::Preferences;
    use shared::spicyness::Spicyness;
    use shared::transcript::Transcript;
    use unicode_width::UnicodeWidthStr;

    use super::{
        HEADLINE, TITLE, Viewport, max_scroll_offset, render, render_settings, slider_bar, wrap,
    };

    fn transcript_with(turns: &[(&str, &str)]) -> Transcript {
        let mut controller =
            ConversationController::new("gpt-4o-mini", Duration::from_secs(1), Preferences::default());
        for (question, answer) in turns {
            controller
                .begin_turn(question)
                .expect("controller should be idle");
            controller.apply_chunk(&CompletionChunk::text(*answer));
            controller.finish_turn();
        }
        controller.transcript().clone()
    }

    fn viewport(width: usize, height: usize) -> Viewport {
        Viewport { width, height }
    }

    #[test]
    fn empty_transcript_shows_top_bar_and_headline() {
        let lines = render(&Transcript::default(), viewport(40, 20), 0);

        assert!(lines[0].contains(TITLE));
        assert_eq!(lines[1], "─".repeat(40));
        assert!(lines.iter().any(|line| line.trim() == HEADLINE));
    }

    #[test]
    fn user_bubbles_hug_the_right_edge_and_koala_bubbles_the_left() {
        let transcript = transcript_with(&[("are birds real?", "no")]);
        let lines = render(&transcript, viewport(40, 40), 0);

        let user_line = lines
            .iter()
            .find(|line| line.contains("│ are birds real? │"))
            .expect("user bubble should render");
        assert_eq!(user_line.chars().count(), 40);

        let koala_line = lines
            .iter()
            .find(|line| line.contains("│ no │"))
            .expect("koala bubble should render");
        assert!(koala_line.starts_with('│'));

        assert!(lines.iter().any(|line| line.trim() == "you"));
        assert!(lines.iter().any(|line| line == "koala"));
    }

    #[test]
    fn bubbles_stay_within_three_quarters_of_the_width() {
        let long_answer = "the moon is a hologram projected by a consortium of very tired pigeons";
        let transcript = transcript_with(&[("why?", long_answer)]);
        let lines = render(&transcript, viewport(40, 60), 0);

        let bubble_lines = lines
            .iter()
            .filter(|line| line.starts_with('│') || line.starts_with('╭'));
        for line in bubble_lines {
            assert!(line.chars().count() <= 30, "too wide: {line:?}");
        }
    }

    #[test]
    fn view_is_pinned_to_the_newest_lines() {
        let transcript = transcript_with(&[("one", "uno"), ("two", "dos"), ("three", "tres")]);
        let lines = render(&transcript, viewport(40, 8), 0);

        assert_eq!(lines.len(), 8);
        assert!(lines[7].contains('╰'));
        assert!(lines.iter().any(|line| line.contains("tres")));
        assert!(!lines.iter().any(|line| line.trim() == HEADLINE));
    }

    #[test]
    fn scrolling_back_reaches_the_headline() {
        let transcript = transcript_with(&[("one", "uno"), ("two", "dos"), ("three", "tres")]);
        let view = viewport(40, 8);
        let limit = max_scroll_offset(&transcript, view);

        let top = render(&transcript, view, limit);
        assert!(top.iter().any(|line| line.trim() == HEADLINE));
        assert_eq!(render(&transcript, view, limit + 100), top);
    }

    #[test]
    fn wrap_breaks_on_words_and_splits_long_words() {
        assert_eq!(wrap("aa bb cc", 5), vec!["aa bb", "cc"]);
        assert_eq!(wrap("abcdefgh", 3), vec!["abc", "def", "gh"]);
        assert_eq!(wrap("line one\n\nline two", 20), vec!["line one", "", "line two"]);
        assert_eq!(wrap("", 10), vec![""]);
    }

    #[test]
    fn wide_characters_keep_bubble_borders_aligned() {
        let answer = "yes 🐨🐨 they are everywhere 🐨 and they are listening closely";
        let transcript = transcript_with(&[("koala?", answer)]);
        let lines = render(&transcript, viewport(40, 40), 0);

        let koala_bubble: Vec<&String> = lines
            .iter()
            .skip_while(|line| line.as_str() != "koala")
            .skip(1)
            .take_while(|line| !line.is_empty())
            .collect();
        let top_width = koala_bubble[0].width();
        assert!(koala_bubble.iter().all(|line| line.width() == top_width));

        let user_line = lines
            .iter()
            .find(|line| line.contains("│ koala? │"))
            .expect("user bubble should render");
        assert_eq!(user_line.width(), 40);
        assert_eq!(lines[0].width(), (40 - TITLE.width()) / 2 + TITLE.width());
    }

    #[test]
    fn wrap_counts_wide_characters_as_two_columns() {
        assert_eq!(wrap("🐨🐨🐨", 4), vec!["🐨🐨", "🐨"]);
        assert_eq!(wrap("a 🐨", 4), vec!["a 🐨"]);
        assert_eq!(wrap("a 🐨", 3), vec!["a", "🐨"]);
        assert_eq!(wrap("🐨", 1), vec!["🐨"]);
    }

    #[test]
    fn slider_bar_places_knob_on_the_current_step() {
        let bar = slider_bar(Spicyness::default());
        let cells = bar
            .split(['[', ']'])
            .nth(1)
            .expect("bar should have brackets");

        assert_eq!(cells.chars().count(), 41);
        assert_eq!(cells.chars().position(|cell| cell == '●'), Some(2));
        assert!(bar.starts_with("0 ["));
        assert!(bar.ends_with("] 2"));
    }

    #[test]
    fn settings_show_live_values_and_notice() {
        let preferences = Preferences {
            context: "pigeons are surveillance drones".to_string(),
            spicyness: Spicyness::new(1.25),
        };
        let lines = render_settings(&preferences, viewport(80, 40), Some("could not save"));

        assert!(lines.iter().any(|line| line.trim() == "pigeons are surveillance drones"));
        assert!(lines.iter().any(|line| line.ends_with("1.25") && line.contains("Spicyness")));
        assert!(lines.iter().any(|line| line == "could not save"));
        assert!(lines.iter().any(|line| line.contains(".1 .2 .3")));
    }

    #[test]
    fn settings_show_placeholder_for_empty_context() {
        let lines = render_settings(&Preferences::default(), viewport(80, 40), None);
        assert!(lines.iter().any(|line| line.trim() == "(none)"));
    }
}
