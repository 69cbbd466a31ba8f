//! Interactive command loop on stdin.
//!
//! A line is either a command (`quit`, `status`, `debug on|off`) or a new
//! filter: a category followed by wanted attribute tokens. Filter runs read
//! the latest snapshot and never touch the capture pipeline.

use std::io::BufRead;
use std::sync::Arc;

use fastrace::prelude::*;
use log::LevelFilter;
use modsift_core::{AttributeSet, Category, Filter, Session};
use parking_lot::RwLock;

use crate::Shared;
use crate::render;

#[derive(Debug, PartialEq, Eq)]
pub enum Command {
	Quit,
	Status,
	Debug(bool),
	Filter(Filter),
}

pub fn parse_command(line: &str) -> Result<Command, String> {
	let mut tokens = line.split_whitespace();
	let first = tokens.next().ok_or_else(|| "empty command".to_string())?;
	match first.to_ascii_lowercase().as_str() {
		"quit" | "exit" => Ok(Command::Quit),
		"status" => Ok(Command::Status),
		"debug" => match tokens.next() {
			Some("on") => Ok(Command::Debug(true)),
			Some("off") => Ok(Command::Debug(false)),
			_ => Err("usage: debug on|off".to_string()),
		},
		token => {
			let category = match token {
				"any" => None,
				_ => Some(token.parse::<Category>()?),
			};
			let wanted = tokens
				.map(str::parse)
				.collect::<Result<AttributeSet, String>>()?;
			Ok(Command::Filter(
				Filter::new().with_category(category).with_wanted(wanted),
			))
		}
	}
}

/// Runs the current filter inside a trace span and prints the result.
pub fn refilter(session: &Session, shared: &Arc<RwLock<Shared>>, json: bool) {
	let filter = shared.read().filter;
	let root = Span::root("filter-run", SpanContext::random());
	let _guard = root.set_local_parent();
	let result = session.run_filter(&filter);
	shared.write().last_stats = Some(result.stats);
	println!("{}", render::render(&result, &session.snapshot(), &filter, json));
}

fn print_status(session: &Session, shared: &Arc<RwLock<Shared>>) {
	let snapshot = session.snapshot();
	println!("state: {:?}", session.state());
	println!(
		"inventory: {} modules (revision {})",
		snapshot.len(),
		snapshot.revision()
	);
	{
		let shared = shared.read();
		println!("filter: {}", describe(&shared.filter));
		if let Some(stats) = shared.last_stats {
			println!(
				"last run: pool {}, {} enumerated, {} pruned, {} retained",
				stats.pool_size, stats.enumerated, stats.pruned, stats.retained
			);
		}
	}
	for (flow, stats) in session.flow_stats() {
		println!("flow {}: {} packets, {} bytes", flow, stats.packets, stats.bytes);
	}
}

fn describe(filter: &Filter) -> String {
	let category = match filter.category {
		Some(category) => category.to_string(),
		None => "any".to_string(),
	};
	let attrs: Vec<String> = filter.wanted.iter().map(|a| a.display_name().to_string()).collect();
	let attrs = if attrs.is_empty() {
		"no preference".to_string()
	} else {
		attrs.join(", ")
	};
	let exclusive = if filter.exclusive { ", exclusive" } else { "" };
	format!("{category} / {attrs}{exclusive}")
}

/// Blocking stdin loop; sends on `quit` when the user exits.
pub fn run(session: Session, shared: Arc<RwLock<Shared>>, json: bool, quit: kanal::Sender<()>) {
	let stdin = std::io::stdin();
	for line in stdin.lock().lines() {
		let Ok(line) = line else { break };
		let line = line.trim();
		if line.is_empty() {
			continue;
		}
		match parse_command(line) {
			Ok(Command::Quit) => {
				let _ = quit.send(());
				break;
			}
			Ok(Command::Status) => print_status(&session, &shared),
			Ok(Command::Debug(on)) => {
				log::set_max_level(if on { LevelFilter::Debug } else { LevelFilter::Info });
				println!("debug logging {}", if on { "on" } else { "off" });
			}
			Ok(Command::Filter(filter)) => {
				// Preserve the exclusive switch from the command line.
				let exclusive = shared.read().filter.exclusive;
				shared.write().filter = filter.with_exclusive(exclusive);
				refilter(&session, &shared, json);
			}
			Err(e) => eprintln!("{e}"),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use modsift_core::AttributeType;

	#[test]
	fn commands_parse() {
		assert_eq!(parse_command("quit").unwrap(), Command::Quit);
		assert_eq!(parse_command("status").unwrap(), Command::Status);
		assert_eq!(parse_command("debug on").unwrap(), Command::Debug(true));
		assert_eq!(parse_command("debug off").unwrap(), Command::Debug(false));
		assert!(parse_command("debug loud").is_err());
	}

	#[test]
	fn filter_lines_parse() {
		let Command::Filter(filter) = parse_command("attack strength crit-focus").unwrap() else {
			panic!("expected a filter");
		};
		assert_eq!(filter.category, Some(Category::Attack));
		assert!(filter.wanted.contains(AttributeType::Strength));
		assert!(filter.wanted.contains(AttributeType::CritFocus));
		assert_eq!(filter.wanted.len(), 2);

		let Command::Filter(filter) = parse_command("any").unwrap() else {
			panic!("expected a filter");
		};
		assert_eq!(filter.category, None);
		assert!(filter.wanted.is_empty());
	}

	#[test]
	fn bad_tokens_are_reported() {
		assert!(parse_command("attack bogus").is_err());
		assert!(parse_command("castle").is_err());
	}
}
