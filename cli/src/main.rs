mod test_runner;

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term;
use codespan_reporting::term::termcolor::{ColorChoice, StandardStream};

use extend::{ExtendError, ExtendOptions, FsLoader, LoadError};
use markup::ParseError;

const SUBCOMMANDS: &[&str] = &["render", "test", "help"];

/// Options file picked up from the input's directory when `--config` is not given.
const CONFIG_FILE: &str = "extend.toml";

#[derive(Parser)]
#[command(
    name = "markup-extend",
    version,
    about = "Resolve <extends>/<block> layout inheritance in markup documents"
)]
struct Cli {
    /// Disable colored error output
    #[arg(long, global = true)]
    no_color: bool,

    /// Log each layout load and block merge
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render a document with its layouts resolved
    Render(RenderArgs),

    /// Run .test.html scenario files
    Test(TestArgs),
}

#[derive(clap::Args)]
struct RenderArgs {
    /// Markup source file to render
    file: PathBuf,

    /// Directory layouts are resolved against (default: the file's directory)
    #[arg(short, long)]
    root: Option<PathBuf>,

    /// TOML options file (default: extend.toml next to the input, if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Skip override blocks the layout does not define instead of failing
    #[arg(long)]
    no_strict: bool,

    /// Write the rendered document here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print the dependency records as JSON lines instead of the document
    #[arg(long)]
    deps: bool,
}

#[derive(clap::Args)]
struct TestArgs {
    /// Path to a .test.html file or a directory containing them
    path: PathBuf,

    /// Run only tests in these categories (subfolder names). Repeatable.
    #[arg(short, long)]
    category: Vec<String>,

    /// List available categories and exit
    #[arg(long)]
    list_categories: bool,
}

fn main() {
    // `markup-extend page.html` is shorthand for `markup-extend render page.html`.
    let mut args: Vec<String> = std::env::args().collect();
    if let Some(pos) = args
        .iter()
        .skip(1)
        .position(|a| !a.starts_with('-'))
        .map(|p| p + 1)
    {
        if !SUBCOMMANDS.contains(&args[pos].as_str()) {
            args.insert(pos, "render".to_string());
        }
    }

    let cli = Cli::parse_from(&args);

    let level = if cli.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Warn
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    match cli.command {
        Command::Render(render_args) => do_render(render_args, cli.no_color),
        Command::Test(test_args) => {
            if test_args.list_categories {
                test_runner::list_categories(&test_args.path);
                return;
            }
            let exit_code =
                test_runner::run_tests(&test_args.path, cli.no_color, &test_args.category);
            process::exit(exit_code);
        }
    }
}

fn do_render(args: RenderArgs, no_color: bool) {
    let color_choice = if no_color {
        ColorChoice::Never
    } else {
        ColorChoice::Auto
    };
    let writer = StandardStream::stderr(color_choice);

    let source = match std::fs::read_to_string(&args.file) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: cannot read '{}': {}", args.file.display(), e);
            process::exit(1);
        }
    };

    let options = match resolve_options(&args) {
        Ok(options) => options,
        Err(message) => {
            eprintln!("error: {}", message);
            process::exit(1);
        }
    };

    let origin = args.file.display().to_string();
    let mut files = SimpleFiles::new();
    let file_id = files.add(origin.clone(), source.clone());

    let document = match markup::Parser::new(source, file_id).parse() {
        Ok(document) => document,
        Err(errors) => {
            emit_parse_errors(&writer, &files, &errors, file_id);
            process::exit(1);
        }
    };

    let resolved = match extend::rewrite_document(document, &origin, &options, FsLoader) {
        Ok(resolved) => resolved,
        Err(error) => {
            emit_extend_error(&writer, &mut files, &error);
            process::exit(1);
        }
    };

    if args.deps {
        for dependency in &resolved.dependencies {
            match serde_json::to_string(dependency) {
                Ok(line) => println!("{}", line),
                Err(e) => {
                    eprintln!("error: cannot encode dependency: {}", e);
                    process::exit(1);
                }
            }
        }
        return;
    }

    let rendered = resolved.into_document().to_string();
    match &args.output {
        Some(path) => {
            if let Err(e) = std::fs::write(path, rendered) {
                eprintln!("error: cannot write '{}': {}", path.display(), e);
                process::exit(1);
            }
        }
        None => print!("{}", rendered),
    }
}

/// Options from the config file (if any), then command-line overrides.
fn resolve_options(args: &RenderArgs) -> Result<ExtendOptions, String> {
    let base_dir = args
        .file
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    let config_path = match &args.config {
        Some(path) => Some(path.clone()),
        None => {
            let candidate = base_dir.join(CONFIG_FILE);
            candidate.is_file().then_some(candidate)
        }
    };

    let mut options = match &config_path {
        Some(path) => read_config(path)?,
        None => ExtendOptions::default().with_root(&base_dir),
    };
    if let Some(root) = &args.root {
        options.root = root.clone();
    }
    if args.no_strict {
        options.strict = false;
    }
    Ok(options)
}

/// Read a TOML options file. A relative `root` is taken relative to the file itself.
fn read_config(path: &Path) -> Result<ExtendOptions, String> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read '{}': {}", path.display(), e))?;
    let mut options: ExtendOptions = toml::from_str(&text)
        .map_err(|e| format!("invalid options in '{}': {}", path.display(), e))?;
    if let Some(dir) = path.parent() {
        options.root = dir.join(&options.root);
    }
    log::debug!("options from '{}': {:?}", path.display(), options);
    Ok(options)
}

fn emit_parse_errors(
    writer: &StandardStream,
    files: &SimpleFiles<String, String>,
    errors: &[ParseError],
    file_id: usize,
) {
    let config = term::Config::default();
    for error in errors {
        let diagnostic = ParseError {
            file_id,
            ..error.clone()
        }
        .to_diagnostic();
        let _ = term::emit_to_write_style(&mut writer.lock(), &config, files, &diagnostic);
    }
}

fn emit_extend_error(
    writer: &StandardStream,
    files: &mut SimpleFiles<String, String>,
    error: &ExtendError,
) {
    match error {
        // Layout syntax errors get the same source-annotated output as the input's.
        ExtendError::Load(LoadError::Parse { path, text, errors }) => {
            let file_id = files.add(path.display().to_string(), text.clone());
            eprintln!("error: cannot parse layout '{}'", path.display());
            emit_parse_errors(writer, files, errors, file_id);
        }
        other => eprintln!("error: {}", other),
    }
}
