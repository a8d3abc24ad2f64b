pub mod stereo_video;
