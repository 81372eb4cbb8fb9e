//! FFmpeg filter graph definitions.
//!
//! Composition input order is fixed: `0` = main clip, `1` = background,
//! `2` = outro for the video graph; `0` = main clip, `1` = music for the
//! audio graphs.

use vcompose_models::{
    CanonicalFrame, OUTPUT_PIXEL_FORMAT, OVERLAY_WIDTH, SILENCE_CHANNEL_LAYOUT,
    SILENCE_SAMPLE_RATE,
};

/// Output label of the composed video graph.
pub const VIDEO_OUT: &str = "[vout]";
/// Output label of both audio graphs.
pub const AUDIO_OUT: &str = "[aout]";

/// Scale to fit inside the frame, then pad to exactly the frame, centered.
pub fn scale_pad(frame: CanonicalFrame) -> String {
    let (w, h) = (frame.width, frame.height);
    format!(
        "scale={w}:{h}:force_original_aspect_ratio=decrease,\
         pad={w}:{h}:(ow-iw)/2:(oh-ih)/2,\
         format={fmt}",
        fmt = OUTPUT_PIXEL_FORMAT
    )
}

/// Silent lavfi audio source used for clips without an audio stream.
pub fn silence_source() -> String {
    format!(
        "anullsrc=channel_layout={}:sample_rate={}",
        SILENCE_CHANNEL_LAYOUT, SILENCE_SAMPLE_RATE
    )
}

/// Geometry produced by [`scale_pad`]: `(scaled_w, scaled_h, pad_x, pad_y)`.
///
/// Mirrors ffmpeg's `force_original_aspect_ratio=decrease` rounding, so the
/// padded output is always exactly `frame` and a canonical input maps to itself.
pub fn fit_within(width: u32, height: u32, frame: CanonicalFrame) -> (u32, u32, u32, u32) {
    if width == 0 || height == 0 {
        return (frame.width, frame.height, 0, 0);
    }

    let (fw, fh) = (u64::from(frame.width), u64::from(frame.height));
    let (iw, ih) = (u64::from(width), u64::from(height));

    // Height-bound when the source is relatively taller than the frame
    let (sw, sh) = if iw * fh <= ih * fw {
        let sw = ((fh * iw) as f64 / ih as f64).round() as u64;
        (sw.clamp(1, fw), fh)
    } else {
        let sh = ((fw * ih) as f64 / iw as f64).round() as u64;
        (fw, sh.clamp(1, fh))
    };

    let (sw, sh) = (sw as u32, sh as u32);
    (sw, sh, (frame.width - sw) / 2, (frame.height - sh) / 2)
}

/// Overlay the scaled main clip centered on the background, cut at the
/// shorter of the two, then append the outro.
pub fn overlay_concat_graph() -> String {
    format!(
        "[1:v]setpts=PTS-STARTPTS,setsar=1[bg];\
         [0:v]scale={ow}:-2[fg];\
         [bg][fg]overlay=(W-w)/2:(H-h)/2:shortest=1[comp];\
         [2:v]setpts=PTS-STARTPTS,setsar=1[outro];\
         [comp][outro]concat=n=2:v=1:a=0{out}",
        ow = OVERLAY_WIDTH,
        out = VIDEO_OUT
    )
}

/// Average main audio with the (already length-matched) music bed. Output
/// length follows the main audio.
pub fn simple_mix_graph() -> String {
    format!(
        "[0:a][1:a]amix=inputs=2:duration=first:dropout_transition=0:normalize=1{}",
        AUDIO_OUT
    )
}

/// A window cut from the start of the music bed, faded in and out.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FadeWindow {
    /// Window length in seconds
    pub length: f64,
    /// Fade-in and fade-out length in seconds
    pub fade: f64,
}

impl FadeWindow {
    /// Music under the opening of the main clip.
    pub const LEAD_IN: FadeWindow = FadeWindow {
        length: 5.0,
        fade: 1.0,
    };

    /// Music played after the main clip ends.
    pub const TAIL: FadeWindow = FadeWindow {
        length: 12.0,
        fade: 1.0,
    };

    /// Shorten the window to at most `max` seconds.
    ///
    /// An unknown (non-positive) `max` leaves the window unchanged.
    pub fn within(self, max: f64) -> FadeWindow {
        if max.is_nan() || max <= 0.0 || max >= self.length {
            return self;
        }
        FadeWindow {
            length: max,
            fade: self.fade.min(max / 2.0),
        }
    }

    fn chain(&self, input: &str, output: &str) -> String {
        format!(
            "[{input}]atrim=0:{len},asetpts=PTS-STARTPTS,\
             afade=t=in:st=0:d={fade},afade=t=out:st={out_start}:d={fade}[{output}]",
            len = self.length,
            fade = self.fade,
            out_start = (self.length - self.fade).max(0.0),
        )
    }
}

/// Lead-in music mixed under the main audio at full level, followed by the
/// music tail.
pub fn segmented_mix_graph(lead: FadeWindow, tail: FadeWindow) -> String {
    let aformat = format!(
        "aformat=sample_fmts=fltp:sample_rates={}:channel_layouts={}",
        SILENCE_SAMPLE_RATE, SILENCE_CHANNEL_LAYOUT
    );

    [
        "[1:a]asplit=2[m_lead][m_tail]".to_string(),
        lead.chain("m_lead", "lead"),
        tail.chain("m_tail", "tail"),
        format!(
            "[0:a][lead]amix=inputs=2:duration=first:dropout_transition=0:normalize=0,{}[body]",
            aformat
        ),
        format!("[tail]{}[tailf]", aformat),
        format!("[body][tailf]concat=n=2:v=0:a=1{}", AUDIO_OUT),
    ]
    .join(";")
}
