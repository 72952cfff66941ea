use std::env;

use fat12fs::{BlockDevice, DirHandle, Volume};

fn format_file_size(size: u32) -> String {
    const KB: u32 = 1024;
    const MB: u32 = 1024 * KB;
    if size < KB {
        format!("{}B", size)
    } else if size < MB {
        format!("{}KB", size / KB)
    } else {
        format!("{}MB", size / MB)
    }
}

fn main() {
    let image_path = env::args().nth(1).expect("usage: ls <image>");
    let device = BlockDevice::open(&image_path).unwrap();
    let volume = Volume::open(&device, 0).unwrap();
    let mut root = DirHandle::open(&volume, "\\").unwrap();

    while let Some(entry) = root.read() {
        let kind = if entry.directory { "<DIR>" } else { "     " };
        println!("{:4}  {}  {}", format_file_size(entry.size), kind, entry.name);
    }
}
