use console::{Emoji, style};

pub static SUCCESS_ICON: Emoji<'_, '_> = Emoji("✅ ", "");
pub static INFO_ICON: Emoji<'_, '_> = Emoji("ℹ️  ", "");
pub static WARN_ICON: Emoji<'_, '_> = Emoji("⚠️  ", "");
pub static ERROR_ICON: Emoji<'_, '_> = Emoji("❌ ", "");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "");
pub static GLOBE: Emoji<'_, '_> = Emoji("🌐 ", "");
pub static SPARKLE: Emoji<'_, '_> = Emoji("✨ ", "");

pub fn print_success(msg: &str) {
    println!("{} {}", SUCCESS_ICON, style(msg).green());
}

pub fn print_info(msg: &str) {
    println!("{} {}", INFO_ICON, style(msg).blue());
}

pub fn print_warn(msg: &str) {
    println!("{} {}", WARN_ICON, style(msg).yellow());
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", ERROR_ICON, style(msg).red().bold());
}

pub fn print_step(step: &str) {
    println!("{} {}", SPARKLE, style(step).bold());
}

pub fn print_link(label: &str, url: &str) {
    println!(
        "  {} {}: {}",
        GLOBE,
        style(label).bold(),
        style(url).underlined().cyan()
    );
}

pub fn print_banner() {
    let lines: &[&str] = &[
        "               _       _        _              _ ",
        " ___  ___ _ __(_)_ __ | |_  ___| |__   ___  __| |",
        "/ __|/ __| '__| | '_ \\| __|/ __| '_ \\ / _ \\/ _` |",
        "\\__ \\ (__| |  | | |_) | |_ \\__ \\ | | |  __/ (_| |",
        "|___/\\___|_|  |_| .__/ \\__||___/_| |_|\\___|\\__,_|",
        "                |_|                              ",
    ];

    // Gradient: #34d399 → #2dd4bf → #3b82f6 (diagonal top-left → bottom-right)
    const STOPS: [(u8, u8, u8); 3] = [(52, 211, 153), (45, 212, 191), (59, 130, 246)];
    let span = 49 + 8 * (lines.len() as u32 - 1);

    println!();
    for (y, line) in lines.iter().enumerate() {
        for (x, ch) in line.chars().enumerate() {
            if ch == ' ' {
                print!(" ");
                continue;
            }
            let t = ((x as u32 + 8 * y as u32) * 255 / span).min(255);
            let (r, g, b) = gradient_at(&STOPS, t);
            print!("\x1b[38;2;{};{};{}m{}", r, g, b, ch);
        }
        println!();
    }
    print!("\x1b[0m");

    println!("\x1b[38;2;59;130;246mYour shell scripts, scheduled and streamed.\x1b[0m\n");
}

/// Piecewise-linear blend across the stops at position `t` in `0..=255`.
fn gradient_at(stops: &[(u8, u8, u8); 3], t: u32) -> (u8, u8, u8) {
    let (from, to, local) = if t < 128 {
        (stops[0], stops[1], t * 2)
    } else {
        (stops[1], stops[2], (t - 128) * 2)
    };
    let mix = |a: u8, b: u8| ((a as u32 * (255 - local) + b as u32 * local) / 255) as u8;
    (mix(from.0, to.0), mix(from.1, to.1), mix(from.2, to.2))
}

pub fn print_goodbye() {
    println!(
        "\n{} {}",
        SPARKLE,
        style("Thank you for using scriptshed. See you next time!")
            .bold()
            .cyan()
    );
}

/// Boxed help/status section printed by CLI commands.
pub struct GuideSection {
    title: String,
    lines: Vec<String>,
}

impl GuideSection {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            lines: Vec::new(),
        }
    }

    pub fn command(mut self, name: &str, desc: &str) -> Self {
        self.lines.push(format!(
            "  {} {}",
            style(format!("{:<18}", name)).green(),
            desc
        ));
        self
    }

    pub fn status(mut self, label: &str, value: &str) -> Self {
        self.lines.push(format!(
            "  {} {}",
            style(format!("{:<14}", label)).bold().cyan(),
            value
        ));
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.lines.push(format!("  {}", text));
        self
    }

    pub fn info(mut self, text: &str) -> Self {
        self.lines.push(format!("  {} {}", INFO_ICON, text));
        self
    }

    pub fn warn(mut self, text: &str) -> Self {
        self.lines
            .push(format!("  {} {}", WARN_ICON, style(text).yellow()));
        self
    }

    pub fn hint(mut self, command: &str, desc: &str) -> Self {
        if desc.is_empty() {
            self.lines
                .push(format!("  {} {}", style("$").dim(), style(command).cyan()));
        } else {
            self.lines.push(format!(
                "  {} {}  {}",
                style("$").dim(),
                style(command).cyan(),
                style(desc).dim()
            ));
        }
        self
    }

    pub fn blank(mut self) -> Self {
        self.lines.push(String::new());
        self
    }

    pub fn print(self) {
        println!("\n {}", style(self.title).bold().underlined());
        for line in self.lines {
            println!("{}", line);
        }
    }
}
