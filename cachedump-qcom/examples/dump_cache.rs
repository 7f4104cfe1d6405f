use clap::*;
use log::{debug, Level};
use std::fs;

use cachedump_core::prelude::v1::*;
use cachedump_qcom::{builtin_registry, client};

pub fn main() {
    let matches = App::new("dump_cache example")
        .version(crate_version!())
        .author(crate_authors!())
        .arg(Arg::with_name("verbose").short("v").multiple(true))
        .arg(
            Arg::with_name("input")
                .long("input")
                .short("i")
                .takes_value(true)
                .required_unless("list"),
        )
        .arg(
            Arg::with_name("cpu")
                .long("cpu")
                .short("c")
                .takes_value(true)
                .conflicts_with("hardware"),
        )
        .arg(
            Arg::with_name("type")
                .long("type")
                .short("t")
                .takes_value(true)
                .multiple(true)
                .requires("cpu"),
        )
        .arg(
            Arg::with_name("hardware")
                .long("hardware")
                .takes_value(true)
                .requires("client"),
        )
        .arg(
            Arg::with_name("client")
                .long("client")
                .takes_value(true)
                .multiple(true),
        )
        .arg(
            Arg::with_name("format")
                .long("format")
                .takes_value(true)
                .default_value("1"),
        )
        .arg(
            Arg::with_name("args")
                .long("args")
                .short("a")
                .takes_value(true)
                .default_value(""),
        )
        .arg(
            Arg::with_name("schemas")
                .long("schemas")
                .short("s")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("output")
                .long("output")
                .short("o")
                .takes_value(true),
        )
        .arg(Arg::with_name("list").long("list").short("l"))
        .get_matches();

    // set log level
    match matches.occurrences_of("verbose") {
        1 => simple_logger::init_with_level(Level::Warn).unwrap(),
        2 => simple_logger::init_with_level(Level::Info).unwrap(),
        3 => simple_logger::init_with_level(Level::Debug).unwrap(),
        4 => simple_logger::init_with_level(Level::Trace).unwrap(),
        _ => simple_logger::init_with_level(Level::Error).unwrap(),
    }

    // builtin layouts + schemas found on disk
    let (mut registry, mut load_failures) = builtin_registry();
    let inventory = match matches.value_of("schemas") {
        Some(dir) => SchemaInventory::with_path(dir),
        None => SchemaInventory::try_new(),
    };
    match inventory {
        Ok(inventory) => load_failures.extend(inventory.load_all(&mut registry)),
        Err(err) => debug!("no schema inventory: {}", err),
    }

    if matches.is_present("list") {
        for cpu in registry.cpus() {
            println!("{}: {}", cpu, registry.cache_types(&cpu).join(", "));
        }
        for err in load_failures.iter() {
            println!("{}", err);
        }
        return;
    }

    let args = DumpArgs::try_parse_str(matches.value_of("args").unwrap()).unwrap();
    let keys: Vec<RequestKey> = match (matches.value_of("cpu"), matches.value_of("hardware")) {
        (Some(cpu), _) => matches
            .values_of("type")
            .map(|types| {
                types
                    .map(|ty| DumpRequest::parse_named(cpu, ty).key)
                    .collect()
            })
            .unwrap_or_else(|| {
                registry
                    .cache_types(cpu)
                    .iter()
                    .map(|ty| DumpRequest::parse_named(cpu, ty).key)
                    .collect()
            }),
        (None, Some(hardware)) => {
            let version = matches.value_of("format").unwrap().parse::<u8>().unwrap();
            matches
                .values_of("client")
                .unwrap()
                .map(|id| {
                    let id = parse_number(id).unwrap() as u32;
                    if let Some((name, cpu)) = client::describe(id) {
                        println!("client {:#x}: {} of cpu {}", id, name, cpu);
                    }
                    RequestKey::Layout(LayoutKey::hardware(hardware, id, version))
                })
                .collect()
        }
        (None, None) => {
            println!("either --cpu or --hardware has to be specified");
            return;
        }
    };

    let requests = keys
        .into_iter()
        .map(|key| DumpRequest::from_args(key, &args).unwrap())
        .collect::<Vec<_>>();

    let buf = fs::read(matches.value_of("input").unwrap()).unwrap();
    let mut session = DumpSession::new(&registry);
    let report = session.run_all(&buf, &requests);

    match matches.value_of("output") {
        Some(output) => {
            let mut sink = DirectorySink::new(output).unwrap();
            report.write(&mut sink).unwrap();
        }
        None => {
            for (key, output) in report.outputs.iter() {
                println!("# {}", key);
                for table in output.tables() {
                    println!("## {}", table.name);
                    print!("{}", table);
                }
            }
        }
    }

    for err in load_failures.iter() {
        println!("{}", err);
    }
    for (key, err) in report.failures.iter() {
        println!("{}: {}", key, err);
    }
}
