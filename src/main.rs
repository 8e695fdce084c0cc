use shrinkjar::*;

use clap::{App, Arg};
use std::collections::HashSet;
use std::fmt::Write as _;
use std::fs;
use std::path::PathBuf;

fn main() -> Result<(), errors::Error> {
    env_logger::init();

    let matches = App::new("shrinkjar configuration front end")
        .version("0.1.0")
        .about("Compiles keep-rule configurations and checks them against class pools")
        .arg(
            Arg::with_name("ignore warnings")
                .long("ignore-warnings")
                .help("Continue even when references cannot be resolved"),
        )
        .arg(
            Arg::with_name("base directory")
                .long("base-directory")
                .value_name("DIR")
                .takes_value(true)
                .help("Base directory for relative file names in the configuration"),
        )
        .arg(
            Arg::with_name("CONFIG")
                .help("Configuration file(s) to read, in order")
                .required(true)
                .multiple(true)
                .index(1),
        )
        .get_matches();

    let mut configuration = config::Configuration::new();
    for file in matches.values_of("CONFIG").unwrap() {
        log::info!("Reading configuration '{}'", file);
        configuration.parsed_files.push(PathBuf::from(file));
        let mut source = config::WordSource::from_file(file)?;
        if let Some(directory) = matches.value_of("base directory") {
            source.set_base_directory(PathBuf::from(directory));
        }
        let mut parser = config::ConfigurationParser::new(source)?;
        parser.parse(&mut configuration)?;
    }
    if matches.is_present("ignore warnings") {
        configuration.ignore_warnings = true;
    }

    configuration
        .validate()
        .map_err(errors::Error::Configuration)?;

    let rules = matcher::compile_keep_rules(&configuration);
    log::info!("Compiled {} keep rule(s)", rules.len());

    let mut view = app_view::AppView::new();
    let mut diagnostics = match link::link(&mut view, &configuration) {
        Ok(diagnostics) => diagnostics,
        Err(aborted) => {
            print_diagnostics(&aborted.diagnostics);
            return Err(aborted.into());
        }
    };
    link::run_checkers(&view, &configuration, &rules, &mut diagnostics);
    print_diagnostics(&diagnostics);

    if let Some(path) = &configuration.print_seeds {
        let seeds = render_seeds(&view, &rules);
        if path.as_os_str().is_empty() {
            print!("{}", seeds);
        } else {
            log::info!("Writing seeds to '{}'", path.display());
            fs::write(path, seeds)?;
        }
    }

    Ok(())
}

fn print_diagnostics(diagnostics: &link::Diagnostics) {
    for diagnostic in link::sorted_for_display(diagnostics) {
        eprintln!("{}", diagnostic);
    }
}

/// One line per kept class, then one per kept member, deduplicated across
/// rules but in rule order
fn render_seeds(view: &app_view::AppView, rules: &[matcher::KeepRule]) -> String {
    let mut out = String::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut emit = |line: String, out: &mut String| {
        if seen.insert(line.clone()) {
            let _ = writeln!(out, "{}", line);
        }
    };

    for matches in link::match_rules(view, rules) {
        for (handle, class_match) in &matches.matched {
            let class = view.get(*handle);
            let class_name = class.name.external();
            emit(class_name.clone(), &mut out);
            for &index in &class_match.fields {
                let field = &class.fields[index];
                emit(
                    format!(
                        "{}: {} {}",
                        class_name,
                        field.descriptor.display_java(),
                        field.name.as_ref()
                    ),
                    &mut out,
                );
            }
            for &index in &class_match.methods {
                let method = &class.methods[index];
                let parameters: Vec<String> = method
                    .descriptor
                    .parameters
                    .iter()
                    .map(jvm::FieldType::display_java)
                    .collect();
                let return_type = method
                    .descriptor
                    .return_type
                    .as_ref()
                    .map_or_else(|| String::from("void"), jvm::FieldType::display_java);
                emit(
                    format!(
                        "{}: {} {}({})",
                        class_name,
                        return_type,
                        method.name.as_ref(),
                        parameters.join(",")
                    ),
                    &mut out,
                );
            }
        }
    }
    out
}
