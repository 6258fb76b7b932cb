//! Assembles one RV32I source file into `output.o`.

use std::fs;
use std::path::PathBuf;
use std::process;

use structopt::clap::ErrorKind;
use structopt::StructOpt;

#[derive(StructOpt, Debug)]
pub struct CommandLine {
    #[structopt(name = "FILE", help = "Assembly source file")]
    pub input: PathBuf,
}

fn main() {
    let args = match CommandLine::from_iter_safe(std::env::args()) {
        Ok(args) => args,
        Err(err) => match err.kind {
            ErrorKind::HelpDisplayed | ErrorKind::VersionDisplayed => err.exit(),
            _ => {
                eprintln!("invalid num of arguments.");
                process::exit(0);
            }
        },
    };

    let path = args.input.display().to_string();
    let source = match fs::read_to_string(&args.input) {
        Ok(source) => source,
        Err(err) => {
            println!("{}: Assembler messages:", path);
            println!("{}", err);
            process::exit(0);
        }
    };

    let object = match rv32as::assemble_to_vec(&path, &source) {
        Ok(object) => object,
        Err(err) => {
            println!("{}: Assembler messages:", path);
            println!("{}", err);
            process::exit(0);
        }
    };

    if let Err(err) = fs::write("output.o", &object) {
        eprintln!("output.o: {}", err);
    }
}
