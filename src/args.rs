use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq)]
pub enum Mode {
    Run,
    Screenshot,
    Classify(PathBuf),
}

#[derive(Debug)]
pub struct Args {
    pub mode: Mode,
    pub debug_mode: bool,
    pub config_dir: PathBuf,
    pub templates_dir: PathBuf,
    pub device: Option<String>,
}

impl Args {
    pub fn parse() -> Option<Self> {
        Self::parse_from(env::args().skip(1))
    }

    /// Parse flags (without the program name). `None` means exit now:
    /// help or version was printed, or an argument was rejected.
    pub fn parse_from<I: IntoIterator<Item = String>>(args: I) -> Option<Self> {
        let mut mode: Option<Mode> = None;
        let mut debug_mode: bool = false;
        let mut config_dir = PathBuf::from("config");
        let mut templates_dir = PathBuf::from("templates");
        let mut device: Option<String> = None;

        for arg in args {
            if arg == "--help" || arg == "-h" {
                print_help();
                return None;
            } else if arg == "--version" || arg == "-v" {
                println!(
                    "Obsidian Knight Run v{} (built {})",
                    env!("APP_VERSION_DISPLAY"),
                    env!("APP_BUILD_DATE")
                );
                return None;
            } else if arg == "--debug" {
                debug_mode = true;
            } else if arg == "--screenshot" || arg == "-s" {
                mode = Some(Mode::Screenshot);
            } else if let Some(val) = arg.strip_prefix("--classify=") {
                mode = Some(Mode::Classify(PathBuf::from(val)));
            } else if let Some(val) = arg.strip_prefix("--config=") {
                config_dir = PathBuf::from(val);
            } else if let Some(val) = arg.strip_prefix("--templates=") {
                templates_dir = PathBuf::from(val);
            } else if let Some(val) = arg.strip_prefix("--device=") {
                if val.is_empty() {
                    eprintln!("❌ Empty device serial");
                    return None;
                }
                device = Some(val.to_string());
            } else {
                eprintln!("❌ Unknown argument: {}", arg);
                print_help();
                return None;
            }
        }

        Some(Args {
            mode: mode.unwrap_or(Mode::Run),
            debug_mode,
            config_dir,
            templates_dir,
            device,
        })
    }
}

fn print_help() {
    println!("🤖 Obsidian Knight Run Automation");
    println!();
    println!("USAGE:");
    println!("    obsidian-knight-run [FLAGS]");
    println!();
    println!("FLAGS:");
    println!("    (no flags)          Connect to the emulator and run automation");
    println!("    --config=DIR        Directory with config.jsonc and card_weights.jsonc (default: config)");
    println!("    --templates=DIR     Directory with reference images (default: templates)");
    println!("    --device=SERIAL     Use this adb device instead of auto-detecting");
    println!("    --screenshot, -s    Take a screenshot and save to file (cli-screenshot.png)");
    println!("    --classify=FILE     Classify a saved screenshot and print the state");
    println!("    --debug             Enable debug logging");
    println!("    --help, -h          Show this help message");
    println!("    --version, -v       Show version information");
    println!();
    println!("EXAMPLES:");
    println!("    obsidian-knight-run --device=127.0.0.1:5555");
    println!("    obsidian-knight-run --screenshot");
    println!("    obsidian-knight-run --classify=cli-screenshot.png --debug");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Option<Args> {
        Args::parse_from(args.iter().map(|a| a.to_string()))
    }

    #[test]
    fn test_defaults() {
        let args = parse(&[]).unwrap();
        assert_eq!(args.mode, Mode::Run);
        assert!(!args.debug_mode);
        assert_eq!(args.config_dir, PathBuf::from("config"));
        assert_eq!(args.templates_dir, PathBuf::from("templates"));
        assert_eq!(args.device, None);
    }

    #[test]
    fn test_flags() {
        let args = parse(&["--debug", "--config=cfg", "--device=emulator-5554", "--classify=shot.png"]).unwrap();
        assert_eq!(args.mode, Mode::Classify(PathBuf::from("shot.png")));
        assert!(args.debug_mode);
        assert_eq!(args.config_dir, PathBuf::from("cfg"));
        assert_eq!(args.device.as_deref(), Some("emulator-5554"));
        assert_eq!(parse(&["-s"]).unwrap().mode, Mode::Screenshot);
    }

    #[test]
    fn test_rejects_unknown_and_empty_device() {
        assert!(parse(&["--gui"]).is_none());
        assert!(parse(&["--device="]).is_none());
    }
}
