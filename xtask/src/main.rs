//! Build automation tasks for the dbconns workspace.
//!
//! Run with `cargo xtask <command>`.
//!
//! ## Available Commands
//!
//! - `ci`: Run all CI checks (format, lint, feature matrix, test)
//! - `fmt`: Check/apply code formatting
//! - `clippy`: Run clippy lints
//! - `features`: Check each crate with each feature set it supports
//! - `test`: Run tests, optionally including the MySQL container suite
//! - `doc`: Generate documentation
//! - `coverage`: Run code coverage (requires cargo-llvm-cov)
//! - `clean`: Clean build artifacts

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use xshell::{Shell, cmd};

/// Feature sets checked per crate by `cargo xtask features`.
const FEATURE_MATRIX: &[(&str, &[&str])] = &[
    ("dbconns-types", &["", "json"]),
    ("dbconns-client", &["", "mysql", "mysql,json"]),
    ("dbconns-pool", &["", "json"]),
];

#[derive(Parser)]
#[command(name = "xtask", about = "Build automation for dbconns")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run all checks (format, lint, feature matrix, test)
    Ci,
    /// Run cargo fmt (--check by default, --fix to apply)
    Fmt {
        /// Apply formatting fixes
        #[arg(long)]
        fix: bool,
    },
    /// Run clippy with all features
    Clippy {
        /// Apply clippy suggestions
        #[arg(long)]
        fix: bool,
    },
    /// Check every crate against its supported feature sets
    Features,
    /// Run tests
    Test {
        /// Test a specific package
        #[arg(short, long)]
        package: Option<String>,
        /// Also run the ignored MySQL suite (requires Docker)
        #[arg(long)]
        mysql: bool,
    },
    /// Generate documentation
    Doc {
        /// Open documentation in browser
        #[arg(long)]
        open: bool,
    },
    /// Run code coverage
    Coverage {
        /// Output format (html, lcov)
        #[arg(long, default_value = "html")]
        format: String,
    },
    /// Clean build artifacts
    Clean,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let sh = Shell::new()?;

    let workspace_root = workspace_root()?;
    sh.change_dir(&workspace_root);

    match cli.command {
        Command::Ci => {
            println!("Running CI checks...");
            fmt(&sh, false)?;
            clippy(&sh, false)?;
            features(&sh)?;
            test(&sh, None, false)?;
            println!("\n✅ All CI checks passed!");
        }
        Command::Fmt { fix } => fmt(&sh, fix)?,
        Command::Clippy { fix } => clippy(&sh, fix)?,
        Command::Features => features(&sh)?,
        Command::Test { package, mysql } => test(&sh, package.as_deref(), mysql)?,
        Command::Doc { open } => doc(&sh, open)?,
        Command::Coverage { format } => coverage(&sh, &format)?,
        Command::Clean => {
            cmd!(sh, "cargo clean").run()?;
            println!("✅ Clean complete.");
        }
    }

    Ok(())
}

fn workspace_root() -> Result<PathBuf> {
    let output = std::process::Command::new("cargo")
        .args(["locate-project", "--workspace", "--message-format=plain"])
        .output()
        .context("failed to run cargo locate-project")?;

    let path = String::from_utf8(output.stdout).context("invalid UTF-8 in cargo output")?;

    Ok(PathBuf::from(path.trim())
        .parent()
        .context("failed to get workspace root")?
        .to_path_buf())
}

fn fmt(sh: &Shell, fix: bool) -> Result<()> {
    if fix {
        println!("Applying formatting...");
        cmd!(sh, "cargo fmt --all").run()?;
    } else {
        println!("Checking formatting...");
        cmd!(sh, "cargo fmt --all -- --check").run()?;
    }
    println!("✅ Formatting ok.");
    Ok(())
}

fn clippy(sh: &Shell, fix: bool) -> Result<()> {
    println!("Running clippy...");
    if fix {
        cmd!(
            sh,
            "cargo clippy --all-features --all-targets --fix --allow-dirty"
        )
        .run()?;
    } else {
        cmd!(
            sh,
            "cargo clippy --all-features --all-targets -- -D warnings"
        )
        .run()?;
    }
    println!("✅ Clippy ok.");
    Ok(())
}

fn features(sh: &Shell) -> Result<()> {
    println!("Checking feature matrix...");
    for (package, sets) in FEATURE_MATRIX {
        for set in *sets {
            println!("  {package} [{set}]");
            if set.is_empty() {
                cmd!(sh, "cargo check -p {package} --no-default-features").run()?;
            } else {
                cmd!(
                    sh,
                    "cargo check -p {package} --no-default-features --features {set}"
                )
                .run()?;
            }
        }
    }
    println!("✅ Feature matrix ok.");
    Ok(())
}

fn test(sh: &Shell, package: Option<&str>, mysql: bool) -> Result<()> {
    println!("Running tests...");
    match package {
        Some(pkg) => cmd!(sh, "cargo test -p {pkg} --all-features").run()?,
        None => cmd!(sh, "cargo test --workspace --all-features").run()?,
    }

    if mysql {
        println!("Running MySQL container suite...");
        cmd!(
            sh,
            "cargo test -p dbconns-pool --all-features --test mysql -- --ignored"
        )
        .run()?;
    }
    println!("✅ All tests passed.");
    Ok(())
}

fn doc(sh: &Shell, open: bool) -> Result<()> {
    println!("Generating documentation...");
    if open {
        cmd!(sh, "cargo doc --all-features --no-deps --open").run()?;
    } else {
        cmd!(sh, "cargo doc --all-features --no-deps").run()?;
    }
    println!("✅ Documentation generated.");
    Ok(())
}

fn coverage(sh: &Shell, format: &str) -> Result<()> {
    println!("Running code coverage...");
    match format {
        "html" => {
            cmd!(sh, "cargo llvm-cov --workspace --all-features --html").run()?;
            println!("✅ Coverage report: target/llvm-cov/html/index.html");
        }
        "lcov" => {
            cmd!(
                sh,
                "cargo llvm-cov --workspace --all-features --lcov --output-path target/lcov.info"
            )
            .run()?;
            println!("✅ Coverage report: target/lcov.info");
        }
        _ => bail!("Unknown coverage format: {format}. Use html or lcov."),
    }
    Ok(())
}
