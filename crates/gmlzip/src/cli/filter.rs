use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use gmlzip_filter::{BackendKind, Error, MatchManifest, RepackOptions, Repackager, Selector};
use serde::Deserialize;

/// Write a copy of an archive keeping only the selected feature records.
#[derive(Debug, clap::Args)]
pub struct Filter {
    /// Source archive.
    pub source: PathBuf,

    /// Destination archive; parent directories are created.
    pub dest: PathBuf,

    /// Filter specification: inline JSON object, or a path to a JSON file.
    /// Maps each document path to "all" or a list of feature ids.
    #[arg(long, value_name = "JSON", required_unless_present = "profile", conflicts_with = "profile")]
    pub spec: Option<String>,

    /// Test profile JSON whose `filter` object holds the specification.
    #[arg(long, value_name = "PATH")]
    pub profile: Option<PathBuf>,

    #[arg(long, value_name = "BACKEND")]
    pub backend: Option<BackendKind>,

    /// Copy companion files the specification does not mention.
    #[arg(long, conflicts_with = "strip_unmentioned")]
    pub keep_unmentioned: bool,

    /// Drop companion files the specification does not mention.
    #[arg(long)]
    pub strip_unmentioned: bool,

    /// Archive directory that spec paths are relative to.
    #[arg(long, value_name = "DIR")]
    pub content_root: Option<String>,

    /// Parent directory for the staged backend's scratch space.
    #[arg(long, value_name = "DIR")]
    pub scratch_dir: Option<PathBuf>,

    /// Write the match manifest as JSON to this path, or `-` for stdout.
    #[arg(long, value_name = "PATH")]
    pub manifest: Option<PathBuf>,
}

type SpecEntries = BTreeMap<String, Selector>;

#[derive(Deserialize)]
struct Profile {
    #[serde(default)]
    filter: Option<SpecEntries>,
}

impl Filter {
    /// Command-line flags take precedence over configuration.
    fn apply(&self, mut options: RepackOptions) -> RepackOptions {
        if let Some(root) = &self.content_root {
            options = options.content_root(root);
        }
        if let Some(backend) = self.backend {
            options = options.backend(backend);
        }
        if self.keep_unmentioned {
            options = options.strip_unmentioned_companions(false);
        }
        if self.strip_unmentioned {
            options = options.strip_unmentioned_companions(true);
        }
        if let Some(dir) = &self.scratch_dir {
            options = options.scratch_dir(dir);
        }
        options
    }

    fn entries(&self) -> anyhow::Result<SpecEntries> {
        if let Some(profile) = &self.profile {
            return read_profile(profile);
        }

        let Some(spec) = self.spec.as_deref() else {
            bail!("either --spec or --profile is required");
        };
        if spec.trim_start().starts_with('{') {
            return serde_json::from_str(spec).context("invalid --spec JSON");
        }

        let text = fs::read_to_string(spec).with_context(|| format!("failed to read spec file '{spec}'"))?;
        serde_json::from_str(&text).with_context(|| format!("invalid spec file '{spec}'"))
    }

    pub fn run(self, options: RepackOptions) -> anyhow::Result<()> {
        let options = self.apply(options);
        let spec = options.filter_spec(self.entries()?)?;
        let manifest_to_stdout = self.manifest.as_deref() == Some(Path::new("-"));

        let report = match Repackager::new(spec, options).run(&self.source, &self.dest) {
            Ok(report) => report,
            Err(Error::NoMatch { manifest }) => {
                print_summary(&mut io::stderr(), &manifest)?;
                bail!(
                    "no records matched in '{}'; '{}' was not written",
                    self.source.display(),
                    self.dest.display()
                );
            }
            Err(e) => {
                return Err(e).with_context(|| format!("failed to filter '{}'", self.source.display()));
            }
        };

        if manifest_to_stdout {
            print_summary(&mut io::stderr(), &report.manifest)?;
        } else {
            print_summary(&mut io::stdout(), &report.manifest)?;
        }

        if let Some(path) = &self.manifest {
            let json = serde_json::to_string_pretty(&report.manifest)?;
            if manifest_to_stdout {
                println!("{json}");
            } else {
                fs::write(path, json + "\n")
                    .with_context(|| format!("failed to write manifest '{}'", path.display()))?;
            }
        }
        Ok(())
    }
}

fn read_profile(path: &Path) -> anyhow::Result<SpecEntries> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read profile '{}'", path.display()))?;
    let profile: Profile = serde_json::from_str(&text)
        .with_context(|| format!("invalid profile '{}'", path.display()))?;

    match profile.filter {
        Some(entries) if !entries.is_empty() => Ok(entries),
        _ => bail!("profile '{}' declares no filter", path.display()),
    }
}

fn print_summary(out: &mut impl Write, manifest: &MatchManifest) -> io::Result<()> {
    for line in manifest.summary() {
        writeln!(out, "{line}")?;
    }
    Ok(())
}
