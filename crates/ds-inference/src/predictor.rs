//! Questionnaire prediction service.
//!
//! Maps the fixed 16-field symptom questionnaire onto the training-time
//! feature order, runs the previously fitted scaler and model, and returns a
//! probability, a 0/1 status and a risk-band recommendation. The feature
//! order is a contract with the transform stage and is checked when the
//! predictor is built, so a stale or foreign artifact fails at startup
//! instead of silently predicting garbage.

use std::path::Path;

use ds_core::{Error, Result};
use ds_data::transform::FittedTransform;
use serde::{Deserialize, Serialize};

use crate::model::RiskModel;

/// Training-time feature order: survey column names, target excluded.
pub const FEATURE_ORDER: [&str; 16] = [
    "Age",
    "Gender",
    "Polyuria",
    "Polydipsia",
    "sudden weight loss",
    "weakness",
    "Polyphagia",
    "Genital thrush",
    "visual blurring",
    "Itching",
    "Irritability",
    "delayed healing",
    "partial paresis",
    "muscle stiffness",
    "Alopecia",
    "Obesity",
];

/// Incoming questionnaire. Field names follow the survey form wire format.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Questionnaire {
    pub age: i64,
    pub sex: i64,
    pub polyuria: i64,
    pub polydipsia: i64,
    pub sudden_weight_loss: i64,
    pub weakness: i64,
    pub polyphagia: i64,
    pub genital_thrush: i64,
    pub visual_blurring: i64,
    pub itching: i64,
    pub irritability: i64,
    pub delayed_healing: i64,
    pub partial_paresis: i64,
    pub muscle_stiffness: i64,
    pub alopecia: i64,
    pub obesity: i64,
}

impl Questionnaire {
    /// Boundary validation: age in (1, 65], every other field a 0/1 flag.
    pub fn validate(&self) -> Result<()> {
        if !(2..=65).contains(&self.age) {
            return Err(Error::Domain(format!(
                "age must be between 2 and 65, got {}",
                self.age
            )));
        }
        let flags = [
            ("sex", self.sex),
            ("polyuria", self.polyuria),
            ("polydipsia", self.polydipsia),
            ("suddenWeightLoss", self.sudden_weight_loss),
            ("weakness", self.weakness),
            ("polyphagia", self.polyphagia),
            ("genitalThrush", self.genital_thrush),
            ("visualBlurring", self.visual_blurring),
            ("itching", self.itching),
            ("irritability", self.irritability),
            ("delayedHealing", self.delayed_healing),
            ("partialParesis", self.partial_paresis),
            ("muscleStiffness", self.muscle_stiffness),
            ("alopecia", self.alopecia),
            ("obesity", self.obesity),
        ];
        for (name, value) in flags {
            if !(0..=1).contains(&value) {
                return Err(Error::Domain(format!("{name} must be 0 or 1, got {value}")));
            }
        }
        Ok(())
    }

    /// The raw numeric feature vector, in [`FEATURE_ORDER`].
    pub fn feature_vector(&self) -> [f64; 16] {
        [
            self.age as f64,
            self.sex as f64,
            self.polyuria as f64,
            self.polydipsia as f64,
            self.sudden_weight_loss as f64,
            self.weakness as f64,
            self.polyphagia as f64,
            self.genital_thrush as f64,
            self.visual_blurring as f64,
            self.itching as f64,
            self.irritability as f64,
            self.delayed_healing as f64,
            self.partial_paresis as f64,
            self.muscle_stiffness as f64,
            self.alopecia as f64,
            self.obesity as f64,
        ]
    }
}

/// Prediction output: decision status, raw probability, risk-band advice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub status: u8,
    pub probability: f64,
    pub recommendation: String,
}

const LOW_RISK_ADVICE: &str = "Low Risk:\nYour risk of diabetes is currently low. To keep it that way:\n\
- Diet: favour whole grains, fresh fruit and vegetables, lean proteins and healthy fats; avoid processed and sugary foods.\n\
- Exercise: at least 30 minutes of brisk walking, jogging, cycling or swimming on 5 days a week.\n\
- Lifestyle: stay hydrated, sleep 7-8 hours a night, and manage stress.\n\
- Monitoring: have your blood sugar checked at routine appointments.";

const MODERATE_RISK_ADVICE: &str = "Moderate Risk:\nYour risk of diabetes is moderate. To reduce it:\n\
- Diet: cut refined carbohydrates and add fibre-rich foods such as legumes and whole grains.\n\
- Exercise: mix aerobic work and strength training, at least 150 minutes of moderate activity per week.\n\
- Weight: if overweight, work towards a healthy weight with professional guidance.\n\
- Lifestyle: avoid smoking, limit alcohol, and watch for symptoms such as frequent urination, fatigue or excessive thirst.\n\
- Monitoring: check blood sugar more frequently and consult a healthcare provider about anything unusual.";

const HIGH_RISK_ADVICE: &str = "High Risk:\nYour risk of diabetes is high. Act now to prevent complications:\n\
- Diet: follow a strict low-glycemic diet under the guidance of a registered dietitian; avoid sugary drinks and high-carb foods.\n\
- Exercise: start with low-impact activity such as walking, cycling or yoga, building up gradually.\n\
- Medical advice: arrange a comprehensive evaluation with your healthcare provider; medication may be necessary.\n\
- Monitoring: check blood glucose regularly and watch for blurry vision or slow-healing wounds.\n\
- Support: consider a diabetes support group to help manage the risk day to day.";

/// Recommendation text for a probability, by fixed non-overlapping bands:
/// `[0, 0.3)` low, `[0.3, 0.7)` moderate, `[0.7, 1.0]` high. Comparisons are
/// exact; no rounding tolerance.
pub fn recommendation_for(probability: f64) -> Result<&'static str> {
    if !probability.is_finite() || !(0.0..=1.0).contains(&probability) {
        return Err(Error::Computation(format!(
            "probability {probability} outside [0, 1]"
        )));
    }
    if probability < 0.3 {
        Ok(LOW_RISK_ADVICE)
    } else if probability < 0.7 {
        Ok(MODERATE_RISK_ADVICE)
    } else {
        Ok(HIGH_RISK_ADVICE)
    }
}

/// Stateless prediction service over immutable, already-fitted artifacts.
pub struct RiskPredictor {
    transform: FittedTransform,
    model: RiskModel,
}

impl RiskPredictor {
    /// Build the service, enforcing the feature-order contract between the
    /// questionnaire, the fitted transform and the model.
    pub fn new(transform: FittedTransform, model: RiskModel) -> Result<Self> {
        if transform.feature_names != FEATURE_ORDER {
            return Err(Error::Config(format!(
                "fitted transform feature order {:?} does not match the questionnaire contract",
                transform.feature_names
            )));
        }
        if model.feature_names != transform.feature_names {
            return Err(Error::Config(format!(
                "model feature order {:?} does not match the fitted transform",
                model.feature_names
            )));
        }
        Ok(Self { transform, model })
    }

    /// Load both artifacts from disk and build the service.
    pub fn from_artifact_files(transform_path: &Path, model_path: &Path) -> Result<Self> {
        let transform = FittedTransform::load_json_file(transform_path)?;
        let model = RiskModel::load_json_file(model_path)?;
        Self::new(transform, model)
    }

    /// Assess a structurally valid questionnaire.
    ///
    /// The 0.5 decision boundary and the 0.3/0.7 recommendation boundaries
    /// are deliberately different thresholds.
    pub fn assess(&self, questionnaire: &Questionnaire) -> Result<RiskAssessment> {
        let raw = questionnaire.feature_vector();
        let scaled = self.transform.transform_row(&raw)?;
        let probability = self.model.predict_proba(&scaled)?;
        let recommendation = recommendation_for(probability)?.to_string();
        Ok(RiskAssessment {
            status: u8::from(probability >= 0.5),
            probability,
            recommendation,
        })
    }
}
