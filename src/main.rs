use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use env_logger::Builder;
use log::{error, info, warn, LevelFilter};

use peforge::pe::{DirectoryKind, PeImage};

/// peforge
/// Reader and writer for PE/COFF executable images
#[derive(Parser)]
#[command(name = "peforge")]
#[command(version = "0.1.0")]
#[command(about = "Reader and writer for PE/COFF executable images", long_about = None)]
struct Args {
    /// Subcommands for different operations
    #[command(subcommand)]
    command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Print the headers and section table of a PE file
    Inspect {
        /// Input PE file path
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },

    /// Parse a PE file and write the rebuilt image back out
    Rewrite {
        /// Input PE file path
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,

        /// Output file path
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,
    },
}

fn main() {
    let args = Args::parse();

    let mut builder = Builder::new();
    builder.filter_level(if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    });
    builder.init();

    match &args.command {
        Command::Inspect { input } => {
            info!("Inspecting PE file: {}", input.display());

            match PeImage::load_from_path(input) {
                Ok(image) => print_image(&image),
                Err(e) => {
                    error!("Error reading PE file: {}", e);
                    process::exit(1);
                }
            }
        }

        Command::Rewrite { input, output } => {
            info!("Rewriting PE file: {}", input.display());
            info!("Output file: {}", output.display());

            let image = match PeImage::load_from_path(input) {
                Ok(image) => image,
                Err(e) => {
                    error!("Error reading PE file: {}", e);
                    process::exit(1);
                }
            };

            let rebuilt = match image.build() {
                Ok(bytes) => bytes,
                Err(e) => {
                    error!("Error rebuilding PE file: {}", e);
                    process::exit(1);
                }
            };

            match image.source {
                Some(ref original) if *original == rebuilt => {
                    info!("Rebuilt image is byte-identical to the input")
                }
                Some(_) => warn!("Rebuilt image differs from the input"),
                None => {}
            }

            if let Err(e) = std::fs::write(output, &rebuilt) {
                error!("Error writing output file: {}", e);
                process::exit(1);
            }

            info!("Wrote {} bytes", rebuilt.len());
        }
    }
}

fn print_image(image: &PeImage) {
    let coff = &image.coff_header;
    let opt = &image.optional_header;

    println!("PE header offset:  0x{:X}", image.dos_header.pe_header_offset);
    println!("DOS stub size:     {} bytes", image.dos_stub.len());
    println!();
    println!("Machine:           {}", coff.machine);
    println!("Sections:          {}", coff.number_of_sections);
    println!("Timestamp:         0x{:08X}", coff.time_date_stamp);
    println!("Characteristics:   0x{:04X}", coff.characteristics.bits());
    println!();
    println!(
        "Format:            {}",
        match opt.magic() {
            0x10b => "PE32",
            _ => "PE32+",
        }
    );
    println!("Image base:        0x{:X}", opt.image_base());
    println!("Entry point RVA:   0x{:X}", opt.address_of_entry_point());
    println!("Size of image:     0x{:X}", opt.size_of_image());
    println!("Subsystem:         {}", opt.subsystem());
    println!();

    if !image.data_directories.is_empty() {
        println!("Data directories:");
        for (i, dir) in image.data_directories.iter().enumerate() {
            if !dir.is_present() {
                continue;
            }
            match DirectoryKind::from_index(i) {
                Some(kind) => println!(
                    "  [{:2}] {:<22} rva 0x{:08X} size 0x{:X}",
                    i, kind, dir.virtual_address, dir.size
                ),
                None => println!(
                    "  [{:2}] {:<22} rva 0x{:08X} size 0x{:X}",
                    i, "(unnamed)", dir.virtual_address, dir.size
                ),
            }
        }
        println!();
    }

    println!("Sections:");
    for section in &image.sections {
        let h = &section.header;
        println!(
            "  {:<8} vaddr 0x{:08X} vsize 0x{:08X} raw 0x{:08X}+0x{:X} {}",
            h.name,
            h.virtual_address,
            h.virtual_size,
            h.pointer_to_raw_data,
            h.size_of_raw_data,
            h.characteristics.permissions()
        );
    }
}
