use coachfeed::cli::{self, Command};

fn main() {
    let command = match cli::parse(std::env::args().skip(1)) {
        Ok(command) => command,
        Err(err) => {
            eprintln!("error: {err}\n\n{}", cli::USAGE);
            std::process::exit(2);
        }
    };

    match command {
        Command::Version => println!("coachfeed {}", coachfeed::VERSION),
        Command::Help => println!("{}", cli::USAGE),
        Command::Open(args) => {
            if let Err(err) = coachfeed::run(args) {
                eprintln!("error: {err:?}");
                std::process::exit(1);
            }
        }
    }
}
