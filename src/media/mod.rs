pub mod ffmpeg;
pub mod hasher;
pub mod ocr;
pub mod probe;
pub mod speech;
pub mod srt;
pub mod subtitles;
pub mod tools;
