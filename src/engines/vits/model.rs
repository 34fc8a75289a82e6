use std::path::Path;

use ndarray::{arr1, Array2};
use ort::execution_providers::CPUExecutionProvider;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::{Session, SessionInputValue};
use ort::value::Tensor;

use crate::error::{EngineError, SynthesisError};
use crate::{AcousticModel, ModelInput};

/// Sample rate assumed when the model metadata carries none.
pub const DEFAULT_SAMPLE_RATE: u32 = 22050;

#[derive(thiserror::Error, Debug)]
pub enum VitsError {
    #[error("ONNX runtime error: {0}")]
    Ort(#[from] ort::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
    #[error("Unsupported model inputs: {0:?}")]
    UnsupportedInputs(Vec<String>),
    #[error("Model produced no output")]
    NoOutput,
}

impl From<VitsError> for EngineError {
    fn from(e: VitsError) -> Self {
        EngineError::ModelLoad(e.to_string())
    }
}

impl From<VitsError> for SynthesisError {
    fn from(e: VitsError) -> Self {
        SynthesisError::Model(e.to_string())
    }
}

/// Parameters for loading and running a VITS model.
#[derive(Debug, Clone)]
pub struct VitsParams {
    /// Number of CPU threads to use for inference.
    /// `None` uses the ORT default (typically all available cores).
    pub num_threads: Option<usize>,
    pub noise_scale: f32,
    pub noise_scale_w: f32,
    /// Duration scale at speed 1.0. Divided by the request speed.
    pub length_scale: f32,
}

impl Default for VitsParams {
    fn default() -> Self {
        Self {
            num_threads: None,
            noise_scale: 0.667,
            noise_scale_w: 0.8,
            length_scale: 1.0,
        }
    }
}

/// How the graph expects its scale inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InputLayout {
    /// `[x, x_length, scales[3]]`: Piper and Coqui exports.
    PackedScales,
    /// `[x, x_length, noise_scale, length_scale, noise_scale_w]`.
    SeparateScales,
}

/// A loaded VITS ONNX session.
pub struct VitsModel {
    session: Session,
    input_names: Vec<String>,
    layout: InputLayout,
    sid_input: Option<String>,
    langid_input: Option<String>,
    sample_rate: u32,
    num_speakers: u32,
    params: VitsParams,
}

impl VitsModel {
    /// Load a VITS model from an `.onnx` file.
    ///
    /// Sample rate and speaker count come from the `sample_rate` and
    /// `n_speakers` metadata entries.
    pub fn load(model_path: &Path, params: VitsParams) -> Result<Self, VitsError> {
        if !model_path.exists() {
            return Err(VitsError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("Model file not found at {}", model_path.display()),
            )));
        }
        log::info!("Loading VITS model from {}", model_path.display());

        let session = init_session(model_path, params.num_threads)?;

        let input_names: Vec<String> = session
            .inputs()
            .iter()
            .map(|input| input.name().to_string())
            .collect();
        let comment = metadata_value(&session, "comment").unwrap_or_default();
        let layout = detect_layout(&comment, &input_names)?;
        let sid_input = find_input(&input_names, &["sid", "speaker"]);
        let langid_input = find_input(&input_names, &["langid"]);

        let sample_rate = metadata_value(&session, "sample_rate")
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(DEFAULT_SAMPLE_RATE);
        let num_speakers = metadata_value(&session, "n_speakers")
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0);

        log::info!(
            "Detected: inputs={:?}, layout={:?}, sample_rate={}, n_speakers={}",
            input_names,
            layout,
            sample_rate,
            num_speakers
        );

        Ok(Self {
            session,
            input_names,
            layout,
            sid_input,
            langid_input,
            sample_rate,
            num_speakers,
            params,
        })
    }

    /// Run ONNX inference over a full id sequence.
    fn run(&mut self, input: &ModelInput) -> Result<Vec<f32>, VitsError> {
        let seq_len = input.token_ids.len();
        let length_scale = self.params.length_scale / input.speed;

        let x = Array2::from_shape_vec((1, seq_len), input.token_ids.clone())?;
        let mut feeds: Vec<(String, SessionInputValue<'_>)> = vec![
            (self.input_names[0].clone(), Tensor::from_array(x)?.into()),
            (
                self.input_names[1].clone(),
                Tensor::from_array(arr1(&[seq_len as i64]))?.into(),
            ),
        ];

        match self.layout {
            InputLayout::PackedScales => {
                let scales = arr1(&[
                    self.params.noise_scale,
                    length_scale,
                    self.params.noise_scale_w,
                ]);
                feeds.push((self.input_names[2].clone(), Tensor::from_array(scales)?.into()));
            }
            InputLayout::SeparateScales => {
                let values = [self.params.noise_scale, length_scale, self.params.noise_scale_w];
                for (name, value) in self.input_names[2..5].iter().zip(values) {
                    feeds.push((name.clone(), Tensor::from_array(arr1(&[value]))?.into()));
                }
            }
        }

        // A graph that declares sid needs it even when metadata says single-speaker.
        if let Some(name) = &self.sid_input {
            let sid = i64::from(input.speaker_id.unwrap_or(0));
            feeds.push((name.clone(), Tensor::from_array(arr1(&[sid]))?.into()));
        }
        if let Some(name) = &self.langid_input {
            feeds.push((name.clone(), Tensor::from_array(arr1(&[0i64]))?.into()));
        }

        let outputs = self.session.run(feeds)?;

        // Extract first output as waveform
        let (_, audio) = outputs.iter().next().ok_or(VitsError::NoOutput)?;
        let audio = audio.try_extract_array::<f32>()?;
        Ok(audio.iter().copied().collect())
    }
}

impl AcousticModel for VitsModel {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn num_speakers(&self) -> u32 {
        self.num_speakers
    }

    fn infer(&mut self, input: &ModelInput) -> Result<Vec<f32>, SynthesisError> {
        Ok(self.run(input)?)
    }
}

fn init_session(onnx_path: &Path, num_threads: Option<usize>) -> Result<Session, VitsError> {
    let providers = vec![CPUExecutionProvider::default().build()];

    let mut builder = Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .with_execution_providers(providers)?;

    if let Some(threads) = num_threads {
        builder = builder.with_intra_threads(threads)?;
    }

    Ok(builder.commit_from_file(onnx_path)?)
}

fn metadata_value(session: &Session, key: &str) -> Option<String> {
    let metadata = session.metadata().ok()?;
    metadata.custom(key).ok().flatten()
}

/// Pick the input layout from the export's metadata and input names.
fn detect_layout(comment: &str, input_names: &[String]) -> Result<InputLayout, VitsError> {
    let comment = comment.to_lowercase();
    let packed = comment.contains("piper")
        || comment.contains("coqui")
        || input_names.iter().any(|n| n == "scales");

    match input_names.len() {
        n if packed && n >= 3 => Ok(InputLayout::PackedScales),
        n if !packed && n >= 5 => Ok(InputLayout::SeparateScales),
        _ => Err(VitsError::UnsupportedInputs(input_names.to_vec())),
    }
}

fn find_input(input_names: &[String], candidates: &[&str]) -> Option<String> {
    input_names
        .iter()
        .find(|name| candidates.contains(&name.as_str()))
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::{detect_layout, find_input, InputLayout, VitsError};

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn piper_exports_use_packed_scales() {
        let inputs = names(&["input", "input_lengths", "scales", "sid"]);
        assert_eq!(detect_layout("", &inputs).unwrap(), InputLayout::PackedScales);
        assert_eq!(
            detect_layout("Piper", &names(&["input", "input_lengths", "s"])).unwrap(),
            InputLayout::PackedScales
        );
        assert_eq!(find_input(&inputs, &["sid", "speaker"]), Some("sid".to_string()));
    }

    #[test]
    fn icefall_exports_use_separate_scales() {
        let inputs = names(&["x", "x_length", "noise_scale", "length_scale", "noise_scale_w"]);
        assert_eq!(
            detect_layout("icefall", &inputs).unwrap(),
            InputLayout::SeparateScales
        );
        assert_eq!(find_input(&inputs, &["sid", "speaker"]), None);
    }

    #[test]
    fn too_few_inputs_are_unsupported() {
        assert!(matches!(
            detect_layout("", &names(&["x", "x_length"])),
            Err(VitsError::UnsupportedInputs(_))
        ));
    }
}
