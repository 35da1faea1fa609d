extern crate log;
extern crate pretty_env_logger;

use std::io::Read;
use std::path::PathBuf;
use std::process::exit;
use std::time::Duration;

use clap::{arg, command, value_parser, ArgMatches, Command};
use log::info;

use crate::binarize::{BinarizeMethod, BinarizeOptions};
use crate::grade::{GradeOptions, Grader, ImageSource};
use crate::locate::{LocateOptions, LocateStrategy};
use crate::template::{check_mark_threshold, AnswerTemplate, TemplateError};
use crate::types::OptionLabel;

mod binarize;
mod consolidate;
mod debug;
mod fields;
mod geometry;
mod grade;
mod image_utils;
mod locate;
mod score;
mod template;
mod types;

fn main() {
    pretty_env_logger::init_custom_env("LOG");

    let matches = cli().get_matches();
    let debug = matches.get_flag("debug");
    let template_path = matches
        .get_one::<PathBuf>("template")
        .expect("template path is required");
    let expected_json = matches
        .get_one::<String>("expected")
        .expect("expected answers are required");
    let strategy = *matches
        .get_one::<LocateStrategy>("strategy")
        .expect("strategy has a default");
    let method = *matches
        .get_one::<BinarizeMethod>("binarize")
        .expect("binarization method has a default");
    let mark_threshold = match mark_threshold_override(&matches) {
        Ok(mark_threshold) => mark_threshold,
        Err(e) => {
            eprintln!("Error: --mark-threshold: {}", e);
            exit(1);
        }
    };
    let deadline = matches
        .get_one::<u64>("timeout_ms")
        .map(|ms| Duration::from_millis(*ms));
    let image_paths = matches
        .get_many::<PathBuf>("images")
        .expect("at least one image is required")
        .cloned()
        .collect::<Vec<_>>();

    let template = match AnswerTemplate::load(template_path) {
        Ok(template) => template,
        Err(e) => {
            eprintln!("Error loading sheet definition: {}", e);
            exit(1);
        }
    };

    let expected: Vec<OptionLabel> = match serde_json::from_str(expected_json) {
        Ok(expected) => expected,
        Err(e) => {
            eprintln!("Error parsing expected answers: {}", e);
            exit(1);
        }
    };

    let options = GradeOptions {
        locate: LocateOptions {
            strategy,
            ..LocateOptions::default()
        },
        binarize: BinarizeOptions {
            method,
            ..BinarizeOptions::default()
        },
        mark_threshold,
        deadline,
        debug,
    };

    let grader = Grader::new(template, options);
    info!(
        "loaded {:?}: {} fields, {} questions, marked at {}%",
        grader.template().title,
        grader.template().fields.len(),
        grader.template().question_count,
        grader.options().mark_threshold()
    );

    let sources = match image_paths
        .into_iter()
        .map(image_source)
        .collect::<Result<Vec<_>, _>>()
    {
        Ok(sources) => sources,
        Err(e) => {
            eprintln!("Error reading image from standard input: {}", e);
            exit(1);
        }
    };
    let response = grader.grade_batch(sources, &expected);

    match serde_json::to_string_pretty(&response) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Error: {}", e);
            exit(1);
        }
    }
}

fn mark_threshold_override(matches: &ArgMatches) -> Result<Option<f32>, TemplateError> {
    matches
        .get_one::<f32>("mark_threshold")
        .copied()
        .map(check_mark_threshold)
        .transpose()
}

/// `-` stands for an image piped in on standard input.
fn image_source(path: PathBuf) -> std::io::Result<ImageSource> {
    if path.as_os_str() == "-" {
        let mut bytes = vec![];
        std::io::stdin().read_to_end(&mut bytes)?;
        Ok(ImageSource::Memory(bytes))
    } else {
        Ok(ImageSource::File(path))
    }
}

#[allow(clippy::cognitive_complexity)]
fn cli() -> Command {
    command!()
        .arg(
            arg!(-t --template <PATH> "Path to the answer sheet definition JSON file")
                .required(true)
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            arg!(-e --expected <JSON> "Expected answers as a JSON array, e.g. '[\"A\",\"C\"]'")
                .required(true),
        )
        .arg(
            arg!(-s --strategy <STRATEGY> "How to find the sheet: largest or quadrilateral")
                .value_parser(|s: &str| s.parse::<LocateStrategy>())
                .default_value("quadrilateral"),
        )
        .arg(
            arg!(-b --binarize <METHOD> "How to separate ink from paper: adaptive or global")
                .value_parser(|s: &str| s.parse::<BinarizeMethod>())
                .default_value("adaptive"),
        )
        .arg(
            arg!(--"mark-threshold" <PERCENT> "Fill percentage at which a field counts as marked")
                .id("mark_threshold")
                .value_parser(value_parser!(f32)),
        )
        .arg(
            arg!(--"timeout-ms" <MS> "Give up on images still being graded after this long")
                .id("timeout_ms")
                .value_parser(value_parser!(u64)),
        )
        .arg(arg!(-d --debug "Write debug images next to each input image"))
        .arg(
            arg!(images: <IMAGE> ... "Paths to photos of answer sheets, or - for standard input")
                .required(true)
                .value_parser(value_parser!(PathBuf)),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        cli().debug_assert();
    }

    #[test]
    fn parses_arguments() {
        let matches = cli()
            .try_get_matches_from([
                "grader",
                "--template",
                "sheet.json",
                "--expected",
                r#"["A","B"]"#,
                "--strategy",
                "largest",
                "--mark-threshold",
                "30",
                "one.jpg",
                "two.jpg",
            ])
            .unwrap();

        assert_eq!(
            matches.get_one::<LocateStrategy>("strategy"),
            Some(&LocateStrategy::LargestRegion)
        );
        assert_eq!(
            matches.get_one::<BinarizeMethod>("binarize"),
            Some(&BinarizeMethod::default())
        );
        assert_eq!(matches.get_one::<f32>("mark_threshold"), Some(&30.0));
        assert_eq!(
            matches
                .get_many::<PathBuf>("images")
                .unwrap()
                .cloned()
                .collect::<Vec<_>>(),
            vec![PathBuf::from("one.jpg"), PathBuf::from("two.jpg")]
        );
        assert!(!matches.get_flag("debug"));
    }

    #[test]
    fn mark_threshold_is_range_checked() {
        let matches_with = |threshold: &str| {
            let flag = format!("--mark-threshold={}", threshold);
            cli()
                .try_get_matches_from([
                    "grader",
                    "-t",
                    "sheet.json",
                    "-e",
                    "[]",
                    flag.as_str(),
                    "one.jpg",
                ])
                .unwrap()
        };

        assert_eq!(mark_threshold_override(&matches_with("30")).unwrap(), Some(30.0));
        assert!(mark_threshold_override(&matches_with("-5")).is_err());
        assert!(mark_threshold_override(&matches_with("NaN")).is_err());
        assert!(mark_threshold_override(&matches_with("100.5")).is_err());

        let matches = cli()
            .try_get_matches_from(["grader", "-t", "sheet.json", "-e", "[]", "one.jpg"])
            .unwrap();
        assert_eq!(mark_threshold_override(&matches).unwrap(), None);
    }

    #[test]
    fn image_paths_are_files() {
        assert!(matches!(
            image_source(PathBuf::from("one.jpg")),
            Ok(ImageSource::File(path)) if path == PathBuf::from("one.jpg")
        ));
    }

    #[test]
    fn rejects_unknown_strategy() {
        let result = cli().try_get_matches_from([
            "grader",
            "-t",
            "sheet.json",
            "-e",
            "[]",
            "-s",
            "hough",
            "one.jpg",
        ]);
        assert!(result.is_err());
    }
}
