use life3d::prelude::*;

fn print_help() {
    println!("life3d - 3D Game of Life (B6/S567)");
    println!();
    println!("Usage:");
    println!("  life3d                          glider demo in a 20^3 universe");
    println!("  life3d run <pattern> [size] [generations] [rule]");
    println!("  life3d patterns                 list pattern names");
    println!("  life3d help");
}

fn run(pattern: &str, size: usize, generations: u64, rule: Rule) -> Result<(), Error> {
    let p = patterns::by_name(pattern).ok_or_else(|| Error::UnknownPattern(pattern.to_string()))?;
    let mut universe = Universe3D::new(Size3::cube(size), rule)?;
    let offset = (size as i64 / 2 - 2).max(0);
    p.load_into(&mut universe, offset, offset, offset);

    println!("{} ({}) in {size}^3, rule {rule}", p.name, p.description);
    println!("gen {:>4}  population {}", 0, universe.population());
    for generation in 1..=generations {
        universe.step();
        println!("gen {:>4}  population {}", generation, universe.population());
    }
    Ok(())
}

fn parse_or<T: std::str::FromStr>(arg: Option<&String>, default: T, what: &str) -> T {
    match arg {
        None => default,
        Some(s) => s.parse().unwrap_or_else(|_| {
            eprintln!("Invalid {what}: {s}");
            std::process::exit(2);
        }),
    }
}

fn main() {
    let args: Vec<String> = std::env::args().collect();

    let result = match args.get(1).map(String::as_str) {
        None => run("glider", 20, 12, Rule::B6_S567),
        Some("--help" | "-h" | "help") => {
            print_help();
            return;
        }
        Some("patterns") => {
            for name in patterns::NAMES {
                let count = patterns::by_name(name).map(|p| p.len()).unwrap_or(0);
                println!("{name:<12} {count:>3} cells");
            }
            return;
        }
        Some("run") => {
            let pattern = args.get(2).map(String::as_str).unwrap_or("glider");
            let size = parse_or(args.get(3), 20usize, "size");
            let generations = parse_or(args.get(4), 12u64, "generation count");
            let rule = parse_or(args.get(5), Rule::B6_S567, "rule");
            run(pattern, size, generations, rule)
        }
        Some(other) => {
            eprintln!("Unknown command: {other}");
            print_help();
            std::process::exit(2);
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
