// Copyright 2024 Kevin Ludwig
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Command-line front end over `fat32_analyzer`: opens an image, runs the
//! analysis, and prints either a human-readable summary or a JSON report.

use std::process::ExitCode;

use clap::Parser;
use fat32_analyzer::{AnalysisSession, FileRecord, Report};
use fat32_analyzer_err::Error;
use fat32_analyzer_io_std::FileByteSource;
use log::error;

#[derive(Parser, Debug)]
#[command(name = "fat32_report", about = "Analyze a FAT32 volume image")]
struct Args {
    /// Path to a raw FAT32 volume image.
    image: std::path::PathBuf,

    /// Show the N most fragmented files.
    #[arg(long, value_name = "N", default_value_t = 10)]
    top: usize,

    /// Emit the full report as JSON instead of a human-readable summary.
    #[arg(long)]
    json: bool,

    /// Also print accumulated warnings.
    #[arg(long)]
    verbose: bool,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e @ (Error::ImageNotFound(_) | Error::Io(_))) => {
            error!("{e}");
            ExitCode::from(2)
        }
        Err(e) => {
            error!("analysis failed: {e}");
            ExitCode::from(1)
        }
    }
}

fn run(args: &Args) -> fat32_analyzer_err::Result<()> {
    let source = FileByteSource::open(&args.image)?;
    let report = AnalysisSession::new(&source).analyze()?;

    if args.json {
        let json = serde_json::to_string_pretty(&report)
            .expect("Report serialization is infallible for well-formed data");
        println!("{json}");
        return Ok(());
    }

    print_summary(&report, args.top);
    if args.verbose {
        print_warnings(&report);
    }
    Ok(())
}

fn print_summary(report: &Report, top: usize) {
    let s = &report.stats;
    println!("files:               {}", s.files_total);
    println!(
        "fragmented files:     {} ({:.1}%)",
        s.files_fragmented, s.files_fragmented_pct
    );
    println!("avg fragments/file:   {:.2}", s.avg_fragments_per_file);
    println!("max fragments:        {}", s.max_fragments);
    println!("total size (bytes):   {}", s.total_size_bytes);
    println!("cluster size (bytes): {}", s.cluster_size_bytes);
    println!("total clusters:       {}", s.total_clusters);
    println!("free runs:            {}", s.free_runs_count);
    println!("largest free run:     {} clusters", s.largest_free_run_clusters);
    println!(
        "volume fragmentation: {:.4}",
        s.volume_fragmentation_index
    );

    println!();
    println!("top {top} most fragmented files:");
    let mut files: Vec<&FileRecord> = report.files.iter().collect();
    files.sort_by(|a, b| b.fragments.cmp(&a.fragments).then_with(|| a.path.cmp(&b.path)));
    for record in files.into_iter().take(top) {
        println!(
            "  {:>6} fragments  {:>10} bytes  {}",
            record.fragments, record.size_bytes, record.path
        );
    }
}

fn print_warnings(report: &Report) {
    if report.warnings.is_empty() {
        println!("\nno warnings");
        return;
    }
    println!("\nwarnings:");
    for warning in &report.warnings {
        println!("  {warning}");
    }
}
