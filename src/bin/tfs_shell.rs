//! `tfs-shell` is an interactive command shell exercising a single mounted
//! TinyFS volume end to end.
//!
//! On startup it tries to mount the given disk file, falling back to
//! `mkfs` + `mount` if that fails, before giving up on the disk entirely.

use std::env;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::exit;

use tinyfs::{Result, TinyFs};

const DEFAULT_DISK_NAME: &str = "tinyFSDisk";
const DEFAULT_DISK_SIZE: u64 = 10240;

fn error(bin: &str, msg: impl std::fmt::Display) -> ! {
	eprintln!("{bin}: error: {msg}");
	exit(1);
}

fn print_cmd_help() {
	println!();
	println!("Commands:");
	println!("  mkfs <path> [bytes]     format a new volume");
	println!("  mount <path>            mount a volume");
	println!("  unmount                 unmount the current volume");
	println!("  open <name>             open (or create) a file, printing its handle");
	println!("  close <fd>              close a handle");
	println!("  write <fd> <text>       rewrite a file's full contents");
	println!("  read <fd> <n>           read n bytes from the current position");
	println!("  seek <fd> <offset>      move a file's position");
	println!("  delete <fd>             delete a file");
	println!("  rename <fd> <name>      rename a file");
	println!("  ro <name> | rw <name>   toggle a file's read-only flag");
	println!("  info <fd>               print a file's timestamps");
	println!("  ls                      list open files");
	println!("  frags                   print the disk map");
	println!("  defrag                  compact the volume");
	println!("  help | quit");
	println!();
}

fn report(result: Result<()>) {
	if let Err(e) = result {
		eprintln!("tfs-shell: {e} (code {})", e.code());
	}
}

fn run_command(tfs: &mut TinyFs, line: &str) -> bool {
	let mut words = line.split_whitespace();
	let Some(cmd) = words.next() else {
		return true;
	};
	match cmd {
		"mkfs" => {
			let Some(path) = words.next() else {
				eprintln!("usage: mkfs <path> [bytes]");
				return true;
			};
			let n_bytes = words
				.next()
				.and_then(|s| s.parse().ok())
				.unwrap_or(DEFAULT_DISK_SIZE);
			report(tfs.mkfs(&PathBuf::from(path), n_bytes));
		}
		"mount" => {
			let Some(path) = words.next() else {
				eprintln!("usage: mount <path>");
				return true;
			};
			report(tfs.mount(&PathBuf::from(path)));
		}
		"unmount" => report(tfs.unmount()),
		"open" => match words.next() {
			Some(name) => match tfs.open_file(name) {
				Ok(fd) => println!("{fd}"),
				Err(e) => eprintln!("tfs-shell: {e}"),
			},
			None => eprintln!("usage: open <name>"),
		},
		"close" => match parse_fd(words.next()) {
			Some(fd) => report(tfs.close_file(fd)),
			None => eprintln!("usage: close <fd>"),
		},
		"write" => {
			let fd = parse_fd(words.next());
			let text: Vec<&str> = words.collect();
			match fd {
				Some(fd) => report(tfs.write_file(fd, text.join(" ").as_bytes())),
				None => eprintln!("usage: write <fd> <text>"),
			}
		}
		"read" => {
			let fd = parse_fd(words.next());
			let n: Option<usize> = words.next().and_then(|s| s.parse().ok());
			match (fd, n) {
				(Some(fd), Some(n)) => {
					let mut out = Vec::with_capacity(n);
					let mut failed = None;
					for _ in 0..n {
						match tfs.read_byte(fd) {
							Ok(b) => out.push(b),
							Err(e) => {
								failed = Some(e);
								break;
							}
						}
					}
					println!("{}", String::from_utf8_lossy(&out));
					if let Some(e) = failed {
						eprintln!("tfs-shell: stopped early: {e}");
					}
				}
				_ => eprintln!("usage: read <fd> <n>"),
			}
		}
		"seek" => {
			let fd = parse_fd(words.next());
			let offset: Option<u16> = words.next().and_then(|s| s.parse().ok());
			match (fd, offset) {
				(Some(fd), Some(offset)) => report(tfs.seek(fd, offset)),
				_ => eprintln!("usage: seek <fd> <offset>"),
			}
		}
		"delete" => match parse_fd(words.next()) {
			Some(fd) => report(tfs.delete_file(fd)),
			None => eprintln!("usage: delete <fd>"),
		},
		"rename" => {
			let fd = parse_fd(words.next());
			match (fd, words.next()) {
				(Some(fd), Some(name)) => report(tfs.rename(fd, name)),
				_ => eprintln!("usage: rename <fd> <name>"),
			}
		}
		"ro" => match words.next() {
			Some(name) => report(tfs.make_ro(name)),
			None => eprintln!("usage: ro <name>"),
		},
		"rw" => match words.next() {
			Some(name) => report(tfs.make_rw(name)),
			None => eprintln!("usage: rw <name>"),
		},
		"info" => match parse_fd(words.next()) {
			Some(fd) => match tfs.read_file_info(fd) {
				Ok(info) => println!(
					"ctime={} mtime={} atime={}",
					info.ctime, info.mtime, info.atime
				),
				Err(e) => eprintln!("tfs-shell: {e}"),
			},
			None => eprintln!("usage: info <fd>"),
		},
		"ls" => match tfs.readdir() {
			Ok(names) => names.iter().for_each(|n| println!("{n}")),
			Err(e) => eprintln!("tfs-shell: {e}"),
		},
		"frags" => match tfs.display_fragments() {
			Ok(map) => println!("{map}"),
			Err(e) => eprintln!("tfs-shell: {e}"),
		},
		"defrag" => report(tfs.defrag()),
		"help" => print_cmd_help(),
		"quit" | "exit" => return false,
		other => eprintln!("tfs-shell: unknown command '{other}' (try 'help')"),
	}
	true
}

fn parse_fd(s: Option<&str>) -> Option<tinyfs::FileDescriptor> {
	s.and_then(|s| s.parse().ok())
}

fn main() {
	let mut args = env::args_os().skip(1);
	let disk_path = args
		.next()
		.map(PathBuf::from)
		.unwrap_or_else(|| PathBuf::from(DEFAULT_DISK_NAME));

	let mut tfs = TinyFs::new();
	if tfs.mount(&disk_path).is_err() {
		if let Err(e) = tfs.mkfs(&disk_path, DEFAULT_DISK_SIZE) {
			error("tfs-shell", e);
		}
		if let Err(e) = tfs.mount(&disk_path) {
			error("tfs-shell", e);
		}
	}

	println!("tfs-shell: mounted {}", disk_path.display());
	print_cmd_help();

	let stdin = io::stdin();
	loop {
		print!("tfs> ");
		let _ = io::stdout().flush();
		let mut line = String::new();
		match stdin.lock().read_line(&mut line) {
			Ok(0) => break,
			Ok(_) => {
				if !run_command(&mut tfs, &line) {
					break;
				}
			}
			Err(e) => error("tfs-shell", e),
		}
	}
}
