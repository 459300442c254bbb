use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

use super::{
    check_optional_email, require_date_order, require_positive_id, require_text, FieldErrors,
    Resource,
};
use crate::grading::{AbsenceStatus, MAX_GRADE};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AnneeScolaire {
    pub libelle: String,
    pub date_debut: NaiveDate,
    pub date_fin: NaiveDate,
    #[serde(default)]
    pub active: bool,
}

impl Resource for AnneeScolaire {
    const PATH: &'static str = "annees-scolaires";
    const TABLE: &'static str = "annees_scolaires";
    const COLUMNS: &'static [&'static str] = &["libelle", "date_debut", "date_fin", "active"];
    const FILTERS: &'static [&'static str] = &["active"];
    const UNIQUE: &'static [&'static [&'static str]] = &[&["libelle"]];

    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        require_text(&mut errors, "libelle", &self.libelle);
        require_date_order(&mut errors, "date_fin", self.date_debut, self.date_fin);
        errors.into_result()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Niveau {
    pub code: String,
    pub libelle: String,
}

impl Resource for Niveau {
    const PATH: &'static str = "niveaux";
    const TABLE: &'static str = "niveaux";
    const COLUMNS: &'static [&'static str] = &["code", "libelle"];
    const FILTERS: &'static [&'static str] = &["code"];
    const UNIQUE: &'static [&'static [&'static str]] = &[&["code"]];

    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        require_text(&mut errors, "code", &self.code);
        require_text(&mut errors, "libelle", &self.libelle);
        errors.into_result()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Specialite {
    pub code: String,
    pub libelle: String,
    pub niveau_id: Option<i64>,
}

impl Resource for Specialite {
    const PATH: &'static str = "specialites";
    const TABLE: &'static str = "specialites";
    const COLUMNS: &'static [&'static str] = &["code", "libelle", "niveau_id"];
    const FILTERS: &'static [&'static str] = &["niveau_id"];
    const UNIQUE: &'static [&'static [&'static str]] = &[&["code"]];

    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        require_text(&mut errors, "code", &self.code);
        require_text(&mut errors, "libelle", &self.libelle);
        if let Some(id) = self.niveau_id {
            require_positive_id(&mut errors, "niveau_id", id);
        }
        errors.into_result()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Classe {
    pub libelle: String,
    pub niveau_id: i64,
    pub specialite_id: Option<i64>,
    pub annee_scolaire_id: i64,
    pub capacite: Option<i32>,
}

impl Resource for Classe {
    const PATH: &'static str = "classes";
    const TABLE: &'static str = "classes";
    const COLUMNS: &'static [&'static str] = &[
        "libelle",
        "niveau_id",
        "specialite_id",
        "annee_scolaire_id",
        "capacite",
    ];
    const FILTERS: &'static [&'static str] = &["niveau_id", "specialite_id", "annee_scolaire_id"];

    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        require_text(&mut errors, "libelle", &self.libelle);
        require_positive_id(&mut errors, "niveau_id", self.niveau_id);
        require_positive_id(&mut errors, "annee_scolaire_id", self.annee_scolaire_id);
        if let Some(id) = self.specialite_id {
            require_positive_id(&mut errors, "specialite_id", id);
        }
        if self.capacite.is_some_and(|capacite| capacite <= 0) {
            errors.add("capacite", "The capacite field must be greater than 0.");
        }
        errors.into_result()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Semestre {
    pub libelle: String,
    pub annee_scolaire_id: i64,
    pub date_debut: NaiveDate,
    pub date_fin: NaiveDate,
}

impl Semestre {
    /// Inclusive date containment.
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.date_debut <= date && date <= self.date_fin
    }
}

impl Resource for Semestre {
    const PATH: &'static str = "semestres";
    const TABLE: &'static str = "semestres";
    const COLUMNS: &'static [&'static str] =
        &["libelle", "annee_scolaire_id", "date_debut", "date_fin"];
    const FILTERS: &'static [&'static str] = &["annee_scolaire_id"];

    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        require_text(&mut errors, "libelle", &self.libelle);
        require_positive_id(&mut errors, "annee_scolaire_id", self.annee_scolaire_id);
        require_date_order(&mut errors, "date_fin", self.date_debut, self.date_fin);
        errors.into_result()
    }
}

/// Unité d'enseignement: a group of subjects worth a number of credits.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Ue {
    pub code: String,
    pub libelle: String,
    pub semestre_id: i64,
    pub credits: i32,
}

impl Resource for Ue {
    const PATH: &'static str = "ues";
    const TABLE: &'static str = "ues";
    const COLUMNS: &'static [&'static str] = &["code", "libelle", "semestre_id", "credits"];
    const FILTERS: &'static [&'static str] = &["semestre_id"];
    const UNIQUE: &'static [&'static [&'static str]] = &[&["code"]];

    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        require_text(&mut errors, "code", &self.code);
        require_text(&mut errors, "libelle", &self.libelle);
        require_positive_id(&mut errors, "semestre_id", self.semestre_id);
        if self.credits < 0 {
            errors.add("credits", "The credits field must be 0 or more.");
        }
        errors.into_result()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Matiere {
    pub code: String,
    pub libelle: String,
    pub coefficient: f64,
    pub ue_id: Option<i64>,
}

impl Resource for Matiere {
    const PATH: &'static str = "matieres";
    const TABLE: &'static str = "matieres";
    const COLUMNS: &'static [&'static str] = &["code", "libelle", "coefficient", "ue_id"];
    const FILTERS: &'static [&'static str] = &["ue_id"];
    const UNIQUE: &'static [&'static [&'static str]] = &[&["code"]];

    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        require_text(&mut errors, "code", &self.code);
        require_text(&mut errors, "libelle", &self.libelle);
        if !(self.coefficient.is_finite() && self.coefficient > 0.0) {
            errors.add("coefficient", "The coefficient field must be greater than 0.");
        }
        if let Some(id) = self.ue_id {
            require_positive_id(&mut errors, "ue_id", id);
        }
        errors.into_result()
    }
}

/// A configurable mention band (`note_min` inclusive, `note_max` exclusive
/// except at the top of the scale).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MentionBand {
    pub libelle: String,
    pub note_min: f64,
    pub note_max: f64,
    pub couleur: String,
}

impl Resource for MentionBand {
    const PATH: &'static str = "mentions";
    const TABLE: &'static str = "mentions";
    const COLUMNS: &'static [&'static str] = &["libelle", "note_min", "note_max", "couleur"];
    const FILTERS: &'static [&'static str] = &[];

    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        require_text(&mut errors, "libelle", &self.libelle);
        if !(0.0..=MAX_GRADE).contains(&self.note_min) {
            errors.add("note_min", "The note_min field must be between 0 and 20.");
        }
        if !(0.0..=MAX_GRADE).contains(&self.note_max) || self.note_max <= self.note_min {
            errors.add(
                "note_max",
                "The note_max field must be greater than note_min and at most 20.",
            );
        }
        let color = Regex::new(r"^#[0-9a-fA-F]{6}$").is_ok_and(|re| re.is_match(&self.couleur));
        if !color {
            errors.add("couleur", "The couleur field must be a #rrggbb color.");
        }
        errors.into_result()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Professeur {
    pub nom: String,
    pub prenom: String,
    pub email: String,
    pub telephone: Option<String>,
    pub specialite: Option<String>,
}

impl Resource for Professeur {
    const PATH: &'static str = "professeurs";
    const TABLE: &'static str = "professeurs";
    const COLUMNS: &'static [&'static str] = &["nom", "prenom", "email", "telephone", "specialite"];
    const FILTERS: &'static [&'static str] = &["email"];
    const UNIQUE: &'static [&'static [&'static str]] = &[&["email"]];

    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        require_text(&mut errors, "nom", &self.nom);
        require_text(&mut errors, "prenom", &self.prenom);
        require_text(&mut errors, "email", &self.email);
        if !self.email.trim().is_empty() {
            check_optional_email(&mut errors, "email", Some(&self.email));
        }
        errors.into_result()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Parent {
    pub nom: String,
    pub prenom: String,
    pub telephone: String,
    pub email: Option<String>,
    pub adresse: Option<String>,
}

impl Resource for Parent {
    const PATH: &'static str = "leparents";
    const TABLE: &'static str = "parents";
    const COLUMNS: &'static [&'static str] = &["nom", "prenom", "telephone", "email", "adresse"];
    const FILTERS: &'static [&'static str] = &["telephone"];

    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        require_text(&mut errors, "nom", &self.nom);
        require_text(&mut errors, "prenom", &self.prenom);
        require_text(&mut errors, "telephone", &self.telephone);
        check_optional_email(&mut errors, "email", self.email.as_deref());
        errors.into_result()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum Sexe {
    #[serde(rename = "M")]
    Masculin,
    #[serde(rename = "F")]
    Feminin,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Eleve {
    pub matricule: String,
    pub nom: String,
    pub prenom: String,
    pub date_naissance: NaiveDate,
    pub sexe: Sexe,
    pub email: Option<String>,
    pub parent_id: Option<i64>,
}

impl Eleve {
    #[must_use]
    pub fn nom_complet(&self) -> String {
        format!("{} {}", self.prenom.trim(), self.nom.trim())
    }
}

impl Resource for Eleve {
    const PATH: &'static str = "eleves";
    const TABLE: &'static str = "eleves";
    const COLUMNS: &'static [&'static str] = &[
        "matricule",
        "nom",
        "prenom",
        "date_naissance",
        "sexe",
        "email",
        "parent_id",
    ];
    const FILTERS: &'static [&'static str] = &["matricule", "parent_id", "sexe"];
    const UNIQUE: &'static [&'static [&'static str]] = &[&["matricule"]];

    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        require_text(&mut errors, "matricule", &self.matricule);
        require_text(&mut errors, "nom", &self.nom);
        require_text(&mut errors, "prenom", &self.prenom);
        check_optional_email(&mut errors, "email", self.email.as_deref());
        if let Some(id) = self.parent_id {
            require_positive_id(&mut errors, "parent_id", id);
        }
        errors.into_result()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Inscription {
    pub eleve_id: i64,
    pub classe_id: i64,
    pub annee_scolaire_id: i64,
    pub date_inscription: NaiveDate,
}

impl Resource for Inscription {
    const PATH: &'static str = "inscriptions";
    const TABLE: &'static str = "inscriptions";
    const COLUMNS: &'static [&'static str] =
        &["eleve_id", "classe_id", "annee_scolaire_id", "date_inscription"];
    const FILTERS: &'static [&'static str] = &["eleve_id", "classe_id", "annee_scolaire_id"];
    const UNIQUE: &'static [&'static [&'static str]] = &[&["eleve_id", "annee_scolaire_id"]];

    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        require_positive_id(&mut errors, "eleve_id", self.eleve_id);
        require_positive_id(&mut errors, "classe_id", self.classe_id);
        require_positive_id(&mut errors, "annee_scolaire_id", self.annee_scolaire_id);
        errors.into_result()
    }
}

/// Assignment of a professor to a subject for a class.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Enseignement {
    pub professeur_id: i64,
    pub matiere_id: i64,
    pub classe_id: i64,
}

impl Resource for Enseignement {
    const PATH: &'static str = "enseignements";
    const TABLE: &'static str = "enseignements";
    const COLUMNS: &'static [&'static str] = &["professeur_id", "matiere_id", "classe_id"];
    const FILTERS: &'static [&'static str] = &["professeur_id", "matiere_id", "classe_id"];
    const UNIQUE: &'static [&'static [&'static str]] = &[&["matiere_id", "classe_id"]];

    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        require_positive_id(&mut errors, "professeur_id", self.professeur_id);
        require_positive_id(&mut errors, "matiere_id", self.matiere_id);
        require_positive_id(&mut errors, "classe_id", self.classe_id);
        errors.into_result()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationType {
    Devoir,
    Examen,
}

impl EvaluationType {
    /// Weight of one grade inside a subject average.
    #[must_use]
    pub const fn weight(self) -> f64 {
        match self {
            Self::Devoir => 1.0,
            Self::Examen => 2.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Note {
    pub eleve_id: i64,
    pub matiere_id: i64,
    pub semestre_id: i64,
    pub valeur: f64,
    pub type_evaluation: EvaluationType,
    pub commentaire: Option<String>,
}

impl Resource for Note {
    const PATH: &'static str = "notes";
    const TABLE: &'static str = "notes";
    const COLUMNS: &'static [&'static str] = &[
        "eleve_id",
        "matiere_id",
        "semestre_id",
        "valeur",
        "type_evaluation",
        "commentaire",
    ];
    const FILTERS: &'static [&'static str] = &["eleve_id", "matiere_id", "semestre_id"];

    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        require_positive_id(&mut errors, "eleve_id", self.eleve_id);
        require_positive_id(&mut errors, "matiere_id", self.matiere_id);
        require_positive_id(&mut errors, "semestre_id", self.semestre_id);
        if !(0.0..=MAX_GRADE).contains(&self.valeur) {
            errors.add("valeur", "The valeur field must be between 0 and 20.");
        }
        errors.into_result()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Absence {
    pub eleve_id: i64,
    pub date: NaiveDate,
    pub heures: i32,
    pub motif: Option<String>,
    pub statut: AbsenceStatus,
}

impl Resource for Absence {
    const PATH: &'static str = "absences";
    const TABLE: &'static str = "absences";
    const COLUMNS: &'static [&'static str] = &["eleve_id", "date", "heures", "motif", "statut"];
    const FILTERS: &'static [&'static str] = &["eleve_id", "statut"];

    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        require_positive_id(&mut errors, "eleve_id", self.eleve_id);
        if self.heures < 1 {
            errors.add("heures", "The heures field must be at least 1.");
        }
        errors.into_result()
    }

    fn prepare_create(payload: &mut Map<String, Value>) {
        let missing = payload.get("statut").map_or(true, Value::is_null);
        if missing {
            let motif = payload
                .get("motif")
                .and_then(Value::as_str)
                .unwrap_or_default();
            let statut = AbsenceStatus::from_legacy_motif(motif);
            payload.insert("statut".to_string(), Value::from(statut.as_str()));
        }
    }
}
