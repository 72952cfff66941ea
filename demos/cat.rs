use std::env;
use std::io::Read;

use fat12fs::{BlockDevice, FileHandle, Volume};

fn main() {
    let image_path = env::args().nth(1).expect("usage: cat <image> <file>");
    let name = env::args().nth(2).expect("usage: cat <image> <file>");

    let device = BlockDevice::open(&image_path).unwrap();
    let volume = Volume::open(&device, 0).unwrap();
    let mut file = FileHandle::open(&volume, &name).unwrap();

    let mut buf = Vec::new();
    file.read_to_end(&mut buf).unwrap();
    print!("{}", String::from_utf8_lossy(&buf));
}
