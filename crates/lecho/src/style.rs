//! SGR handling for predicted text.
//!
//! Predicted characters are written wrapped in an "apply" sequence (the
//! configured unconfirmed style) and an "undo" sequence that restores what
//! the terminal had. The undo side is a moving target: server output changes
//! the terminal's style at any time, so this module tracks the current
//! external style per attribute family and recomputes the undo from it.
//!
//! Styles the engine writes itself echo back through the same SGR scan; an
//! expectation counter keeps those self-inflicted writes from being mistaken
//! for external style changes.

use crate::config::StyleConfig;
use crate::constants::CSI;
use crate::term::{Cell, Color};

/// Weight is one family: bold and dim are mutually exclusive and `22`
/// clears both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Weight {
    #[default]
    Normal,
    Bold,
    Dim,
}

/// Foreground color family; each mode overwrites the family wholesale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Foreground {
    #[default]
    Default,
    /// A 16-color SGR code as written (30-37, 90-97).
    Palette(u8),
    Indexed(u8),
    Rgb(u8, u8, u8),
}

/// Style applied to unconfirmed predictions, plus tracking of the current
/// external style so the undo sequence restores it.
#[derive(Debug, Clone)]
pub struct TypeAheadStyle {
    config: StyleConfig,
    apply_args: Vec<String>,
    apply: String,
    /// Each expected unit is one apply + one undo write still to be scanned.
    expected_incoming: usize,

    weight: Weight,
    italic: bool,
    underline: bool,
    inverse: bool,
    fg: Foreground,
}

impl TypeAheadStyle {
    pub fn new(config: StyleConfig) -> Self {
        let apply_args = apply_args_for(config);
        let apply = compile(&apply_args);
        Self {
            config,
            apply_args,
            apply,
            expected_incoming: 0,
            weight: Weight::default(),
            italic: false,
            underline: false,
            inverse: false,
            fg: Foreground::default(),
        }
    }

    /// The sequence that puts the terminal into the unconfirmed style.
    pub fn apply_sequence(&self) -> &str {
        &self.apply
    }

    /// The sequence that takes the terminal back out of the unconfirmed
    /// style, re-asserting whatever the external style currently is for the
    /// configured style's attribute family.
    pub fn undo_sequence(&self) -> String {
        compile(&self.undo_args())
    }

    /// The sequence reproducing the full current external style, emitted
    /// after rollbacks so mispredicted styling does not linger.
    pub fn current_sequence(&self) -> String {
        let mut args = vec!["0".to_string()];
        match self.weight {
            Weight::Normal => {}
            Weight::Bold => args.push("1".into()),
            Weight::Dim => args.push("2".into()),
        }
        if self.italic {
            args.push("3".into());
        }
        if self.underline {
            args.push("4".into());
        }
        if self.inverse {
            args.push("7".into());
        }
        match self.fg {
            Foreground::Default => {}
            Foreground::Palette(code) => args.push(code.to_string()),
            Foreground::Indexed(n) => {
                args.extend(["38".into(), "5".into(), n.to_string()]);
            }
            Foreground::Rgb(r, g, b) => {
                args.extend([
                    "38".into(),
                    "2".into(),
                    r.to_string(),
                    g.to_string(),
                    b.to_string(),
                ]);
            }
        }
        compile(&args)
    }

    /// Register `count` styled prediction writes about to be scanned back;
    /// each contributes an apply and an undo sequence.
    pub fn expect_incoming_style(&mut self, count: usize) {
        self.expected_incoming += count * 2;
    }

    /// Process the parameter list of one SGR sequence seen in terminal-bound
    /// output. Expected self-writes are consumed; everything else updates
    /// the tracked external style.
    pub fn on_did_write_sgr(&mut self, raw_params: &str) {
        let args: Vec<&str> = raw_params.split(';').collect();
        let undo_args = self.undo_args();
        let mut i = 0;
        while i < args.len() {
            if self.expected_incoming > 0 {
                if has_args_at(&args, i, &undo_args) {
                    self.expected_incoming -= 1;
                    i += undo_args.len();
                    continue;
                }
                if has_args_at(&args, i, &self.apply_args) {
                    self.expected_incoming -= 1;
                    i += self.apply_args.len();
                    continue;
                }
            }
            i += self.update_family(&args, i);
        }
    }

    fn undo_args(&self) -> Vec<String> {
        match self.config {
            StyleConfig::Bold | StyleConfig::Dim => match self.weight {
                Weight::Normal => vec!["22".into()],
                Weight::Bold => vec!["1".into()],
                Weight::Dim => vec!["2".into()],
            },
            StyleConfig::Italic => vec![if self.italic { "3" } else { "23" }.into()],
            StyleConfig::Underlined => vec![if self.underline { "4" } else { "24" }.into()],
            StyleConfig::Inverted => vec![if self.inverse { "7" } else { "27" }.into()],
            StyleConfig::Color(..) => match self.fg {
                Foreground::Default => vec!["39".into()],
                Foreground::Palette(code) => vec![code.to_string()],
                Foreground::Indexed(n) => vec!["38".into(), "5".into(), n.to_string()],
                Foreground::Rgb(r, g, b) => vec![
                    "38".into(),
                    "2".into(),
                    r.to_string(),
                    g.to_string(),
                    b.to_string(),
                ],
            },
        }
    }

    /// Apply one parameter (plus any extended-color payload) to the tracked
    /// families, returning how many parameters were consumed.
    fn update_family(&mut self, args: &[&str], i: usize) -> usize {
        let raw = args[i];
        // An empty parameter means reset; colon-packed subparameters carry
        // the code in their first segment
        let code = if raw.is_empty() {
            "0"
        } else {
            raw.split(':').next().unwrap_or(raw)
        };
        match code {
            "0" => {
                self.weight = Weight::Normal;
                self.italic = false;
                self.underline = false;
                self.inverse = false;
                self.fg = Foreground::Default;
            }
            "1" => self.weight = Weight::Bold,
            "2" => self.weight = Weight::Dim,
            "22" => self.weight = Weight::Normal,
            "3" => self.italic = true,
            "23" => self.italic = false,
            "4" => self.underline = !raw.starts_with("4:0"),
            "24" => self.underline = false,
            "7" => self.inverse = true,
            "27" => self.inverse = false,
            "39" => self.fg = Foreground::Default,
            "38" => return self.update_extended_fg(args, i),
            _ => {
                if let Ok(n) = code.parse::<u8>() {
                    if (30..=37).contains(&n) || (90..=97).contains(&n) {
                        self.fg = Foreground::Palette(n);
                    }
                }
            }
        }
        1
    }

    fn update_extended_fg(&mut self, args: &[&str], i: usize) -> usize {
        let raw = args[i];
        if raw.contains(':') {
            // Colon-packed: the whole color is one parameter
            let sub: Vec<&str> = raw.split(':').collect();
            match sub.get(1) {
                Some(&"5") => {
                    if let Some(n) = sub.get(2).and_then(|s| s.parse().ok()) {
                        self.fg = Foreground::Indexed(n);
                    }
                }
                Some(&"2") if sub.len() >= 5 => {
                    let channel = |s: &&str| s.parse::<u8>().ok();
                    if let (Some(r), Some(g), Some(b)) = (
                        sub.get(sub.len() - 3).and_then(channel),
                        sub.get(sub.len() - 2).and_then(channel),
                        sub.get(sub.len() - 1).and_then(channel),
                    ) {
                        self.fg = Foreground::Rgb(r, g, b);
                    }
                }
                _ => {}
            }
            return 1;
        }
        match args.get(i + 1) {
            Some(&"5") => {
                if let Some(n) = args.get(i + 2).and_then(|s| s.parse().ok()) {
                    self.fg = Foreground::Indexed(n);
                }
                3
            }
            Some(&"2") => {
                let channel = |j: usize| args.get(i + j).and_then(|s| s.parse::<u8>().ok());
                if let (Some(r), Some(g), Some(b)) = (channel(2), channel(3), channel(4)) {
                    self.fg = Foreground::Rgb(r, g, b);
                }
                5
            }
            _ => 1,
        }
    }
}

fn apply_args_for(config: StyleConfig) -> Vec<String> {
    match config {
        StyleConfig::Bold => vec!["1".into()],
        StyleConfig::Dim => vec!["2".into()],
        StyleConfig::Italic => vec!["3".into()],
        StyleConfig::Underlined => vec!["4".into()],
        StyleConfig::Inverted => vec!["7".into()],
        StyleConfig::Color(r, g, b) => vec![
            "38".into(),
            "2".into(),
            r.to_string(),
            g.to_string(),
            b.to_string(),
        ],
    }
}

fn compile(args: &[String]) -> String {
    format!("{CSI}{}m", args.join(";"))
}

fn has_args_at(args: &[&str], at: usize, expected: &[String]) -> bool {
    args.len() >= at + expected.len()
        && expected
            .iter()
            .zip(&args[at..])
            .all(|(want, got)| want == got)
}

/// The SGR sequence reproducing a cell's stored style, used when rolling
/// back over a cell that held styled content.
pub fn cell_style_sequence(cell: &Cell) -> String {
    let mut args = vec!["0".to_string()];
    if cell.attrs.bold {
        args.push("1".into());
    }
    if cell.attrs.dim {
        args.push("2".into());
    }
    if cell.attrs.italic {
        args.push("3".into());
    }
    if cell.attrs.underline {
        args.push("4".into());
    }
    if cell.attrs.reverse {
        args.push("7".into());
    }
    push_color_args(&mut args, cell.fg, 30);
    push_color_args(&mut args, cell.bg, 40);
    compile(&args)
}

fn push_color_args(args: &mut Vec<String>, color: Color, base: u8) {
    match color {
        Color::Default => {}
        Color::Indexed(n) if n < 8 => args.push((base + n).to_string()),
        Color::Indexed(n) if n < 16 => args.push((base + 60 + n - 8).to_string()),
        Color::Indexed(n) => {
            args.extend([(base + 8).to_string(), "5".into(), n.to_string()]);
        }
        Color::Rgb(r, g, b) => {
            args.extend([
                (base + 8).to_string(),
                "2".into(),
                r.to_string(),
                g.to_string(),
                b.to_string(),
            ]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::CellAttrs;

    #[test]
    fn bold_style_derivation() {
        let style = TypeAheadStyle::new(StyleConfig::Bold);
        assert_eq!(style.apply_sequence(), "\x1b[1m");
        assert_eq!(style.undo_sequence(), "\x1b[22m");
    }

    #[test]
    fn color_style_derivation() {
        let style = TypeAheadStyle::new(StyleConfig::Color(255, 128, 0));
        assert_eq!(style.apply_sequence(), "\x1b[38;2;255;128;0m");
        assert_eq!(style.undo_sequence(), "\x1b[39m");
    }

    #[test]
    fn undo_follows_external_weight() {
        let mut style = TypeAheadStyle::new(StyleConfig::Bold);
        style.on_did_write_sgr("2");
        assert_eq!(style.undo_sequence(), "\x1b[2m");
        style.on_did_write_sgr("0");
        assert_eq!(style.undo_sequence(), "\x1b[22m");
    }

    #[test]
    fn undo_follows_external_color() {
        let mut style = TypeAheadStyle::new(StyleConfig::Color(1, 2, 3));
        style.on_did_write_sgr("31");
        assert_eq!(style.undo_sequence(), "\x1b[31m");
        style.on_did_write_sgr("38;5;100");
        assert_eq!(style.undo_sequence(), "\x1b[38;5;100m");
        style.on_did_write_sgr("39");
        assert_eq!(style.undo_sequence(), "\x1b[39m");
    }

    #[test]
    fn expected_writes_do_not_change_tracking() {
        let mut style = TypeAheadStyle::new(StyleConfig::Dim);
        style.expect_incoming_style(1);
        style.on_did_write_sgr("2");
        style.on_did_write_sgr("22");
        // The echoed apply/undo pair was ours; weight family untouched
        assert_eq!(style.undo_sequence(), "\x1b[22m");
        // A third write is genuinely external
        style.on_did_write_sgr("2");
        assert_eq!(style.undo_sequence(), "\x1b[2m");
    }

    #[test]
    fn extended_color_width_scanning() {
        let mut style = TypeAheadStyle::new(StyleConfig::Bold);
        // The color payload must not be misread as standalone parameters
        style.on_did_write_sgr("38;5;1");
        assert_eq!(style.undo_sequence(), "\x1b[22m");
        style.on_did_write_sgr("38;2;1;2;3");
        assert_eq!(style.undo_sequence(), "\x1b[22m");
        style.on_did_write_sgr("38:2::10:20:30");
        assert_eq!(style.undo_sequence(), "\x1b[22m");
        let mut color = TypeAheadStyle::new(StyleConfig::Color(0, 0, 0));
        color.on_did_write_sgr("38:2::10:20:30");
        assert_eq!(color.undo_sequence(), "\x1b[38;2;10;20;30m");
    }

    #[test]
    fn current_sequence_reproduces_state() {
        let mut style = TypeAheadStyle::new(StyleConfig::Dim);
        assert_eq!(style.current_sequence(), "\x1b[0m");
        style.on_did_write_sgr("1;4;31");
        assert_eq!(style.current_sequence(), "\x1b[0;1;4;31m");
        style.on_did_write_sgr("");
        assert_eq!(style.current_sequence(), "\x1b[0m");
    }

    #[test]
    fn cell_style_sequence_round_trip() {
        let mut attrs = CellAttrs::default();
        attrs.bold = true;
        let cell = Cell::with_style('x', Color::Indexed(9), Color::Rgb(1, 2, 3), attrs);
        assert_eq!(cell_style_sequence(&cell), "\x1b[0;1;91;48;2;1;2;3m");
        assert_eq!(cell_style_sequence(&Cell::default()), "\x1b[0m");
    }
}
