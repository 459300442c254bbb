//! Grade averages, mention bands, absence status and report card assembly.
//!
//! Grades are on a 0–20 scale. A subject average weights each grade by its
//! evaluation type; the overall average weights subject averages by the
//! subject coefficient. Mentions are looked up in a [`MentionScale`], either
//! the built-in one or the bands configured through the `mentions` resource.

use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

use crate::model::{Absence, Eleve, Matiere, MentionBand, Note, Record, Semestre};

pub const MAX_GRADE: f64 = 20.0;

/// Built-in mentions used when no band is configured.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mention {
    Excellent,
    TresBien,
    Bien,
    AssezBien,
    Insuffisant,
}

impl Mention {
    pub const ALL: [Self; 5] = [
        Self::Excellent,
        Self::TresBien,
        Self::Bien,
        Self::AssezBien,
        Self::Insuffisant,
    ];

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Excellent => "Excellent",
            Self::TresBien => "Très bien",
            Self::Bien => "Bien",
            Self::AssezBien => "Assez bien",
            Self::Insuffisant => "Insuffisant",
        }
    }

    /// `[min, max)` bounds; the top band includes 20.
    #[must_use]
    pub const fn bounds(self) -> (f64, f64) {
        match self {
            Self::Excellent => (16.0, MAX_GRADE),
            Self::TresBien => (14.0, 16.0),
            Self::Bien => (12.0, 14.0),
            Self::AssezBien => (10.0, 12.0),
            Self::Insuffisant => (0.0, 10.0),
        }
    }

    #[must_use]
    pub const fn color(self) -> &'static str {
        match self {
            Self::Excellent => "#1b5e20",
            Self::TresBien => "#2e7d32",
            Self::Bien => "#1565c0",
            Self::AssezBien => "#ef6c00",
            Self::Insuffisant => "#c62828",
        }
    }

    #[must_use]
    pub fn from_average(average: f64) -> Self {
        Self::ALL
            .into_iter()
            .find(|mention| {
                let (min, max) = mention.bounds();
                average >= min && (average < max || (max >= MAX_GRADE && average <= max))
            })
            .unwrap_or(Self::Insuffisant)
    }
}

impl fmt::Display for Mention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// An ordered set of mention bands.
#[derive(Clone, Debug, PartialEq)]
pub struct MentionScale {
    bands: Vec<MentionBand>,
}

impl Default for MentionScale {
    fn default() -> Self {
        let bands = Mention::ALL
            .into_iter()
            .map(|mention| {
                let (note_min, note_max) = mention.bounds();
                MentionBand {
                    libelle: mention.label().to_string(),
                    note_min,
                    note_max,
                    couleur: mention.color().to_string(),
                }
            })
            .collect();
        Self::from_bands(bands)
    }
}

impl MentionScale {
    /// Build a scale from configured bands, falling back to the built-in
    /// scale when none are configured.
    #[must_use]
    pub fn from_configured(bands: Vec<MentionBand>) -> Self {
        if bands.is_empty() {
            Self::default()
        } else {
            Self::from_bands(bands)
        }
    }

    fn from_bands(mut bands: Vec<MentionBand>) -> Self {
        bands.sort_by(|a, b| b.note_min.total_cmp(&a.note_min));
        Self { bands }
    }

    #[must_use]
    pub fn classify(&self, average: f64) -> Option<&MentionBand> {
        self.bands.iter().find(|band| {
            average >= band.note_min
                && (average < band.note_max || (band.note_max >= MAX_GRADE && average <= band.note_max))
        })
    }
}

/// Weighted mean of `(value, weight)` pairs, `None` when the weights sum to 0.
#[must_use]
pub fn weighted_average<I>(items: I) -> Option<f64>
where
    I: IntoIterator<Item = (f64, f64)>,
{
    let (sum, weights) = items
        .into_iter()
        .fold((0.0, 0.0), |(sum, weights), (value, weight)| {
            (sum + value * weight, weights + weight)
        });
    if weights > 0.0 {
        Some(round2(sum / weights))
    } else {
        None
    }
}

#[must_use]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Explicit absence justification status, stored server-side.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AbsenceStatus {
    Justifiee,
    NonJustifiee,
    EnAttente,
}

impl AbsenceStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Justifiee => "justifiee",
            Self::NonJustifiee => "non_justifiee",
            Self::EnAttente => "en_attente",
        }
    }

    /// Compatibility shim for rows created before the status column existed:
    /// guess the status from the free-text reason. Only used when a create
    /// request omits `statut`.
    #[must_use]
    pub fn from_legacy_motif(motif: &str) -> Self {
        let motif = motif.trim().to_lowercase();
        if motif.is_empty() {
            return Self::EnAttente;
        }
        if motif.contains("non justif") || motif.contains("injustif") {
            return Self::NonJustifiee;
        }
        if ["justif", "certificat", "médical", "medical"]
            .iter()
            .any(|needle| motif.contains(needle))
        {
            return Self::Justifiee;
        }
        Self::EnAttente
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SubjectLine {
    pub matiere_id: i64,
    pub code: String,
    pub libelle: String,
    pub coefficient: f64,
    pub notes: usize,
    pub moyenne: Option<f64>,
    pub mention: Option<String>,
    pub couleur: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AbsenceSummary {
    pub total_heures: i64,
    pub justifiees: i64,
    pub non_justifiees: i64,
    pub en_attente: i64,
}

/// Report card of one student for one semester.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Bulletin {
    pub eleve_id: i64,
    pub eleve: String,
    pub matricule: String,
    pub semestre_id: i64,
    pub semestre: String,
    pub lignes: Vec<SubjectLine>,
    pub moyenne_generale: Option<f64>,
    pub mention: Option<String>,
    pub couleur: Option<String>,
    pub absences: AbsenceSummary,
}

/// Everything needed to assemble a report card.
pub struct BulletinInput<'a> {
    pub eleve: &'a Record<Eleve>,
    pub semestre: &'a Record<Semestre>,
    pub matieres: &'a [Record<Matiere>],
    pub notes: &'a [Record<Note>],
    pub absences: &'a [Record<Absence>],
    pub scale: &'a MentionScale,
}

#[must_use]
pub fn build_bulletin(input: &BulletinInput<'_>) -> Bulletin {
    let eleve_id = input.eleve.id;
    let semestre_id = input.semestre.id;

    let mut lignes: Vec<SubjectLine> = input
        .matieres
        .iter()
        .filter_map(|matiere| {
            let grades: Vec<(f64, f64)> = input
                .notes
                .iter()
                .filter(|note| {
                    note.data.eleve_id == eleve_id
                        && note.data.semestre_id == semestre_id
                        && note.data.matiere_id == matiere.id
                })
                .map(|note| (note.data.valeur, note.data.type_evaluation.weight()))
                .collect();
            if grades.is_empty() {
                return None;
            }
            let moyenne = weighted_average(grades.iter().copied());
            let band = moyenne.and_then(|average| input.scale.classify(average));
            Some(SubjectLine {
                matiere_id: matiere.id,
                code: matiere.data.code.clone(),
                libelle: matiere.data.libelle.clone(),
                coefficient: matiere.data.coefficient,
                notes: grades.len(),
                moyenne,
                mention: band.map(|band| band.libelle.clone()),
                couleur: band.map(|band| band.couleur.clone()),
            })
        })
        .collect();
    lignes.sort_by_key(|ligne| ligne.matiere_id);

    let moyenne_generale = weighted_average(
        lignes
            .iter()
            .filter_map(|ligne| ligne.moyenne.map(|moyenne| (moyenne, ligne.coefficient))),
    );
    let band = moyenne_generale.and_then(|average| input.scale.classify(average));

    let mut absences = AbsenceSummary::default();
    for absence in input.absences.iter().filter(|absence| {
        absence.data.eleve_id == eleve_id && input.semestre.data.contains(absence.data.date)
    }) {
        let heures = i64::from(absence.data.heures);
        absences.total_heures += heures;
        match absence.data.statut {
            AbsenceStatus::Justifiee => absences.justifiees += heures,
            AbsenceStatus::NonJustifiee => absences.non_justifiees += heures,
            AbsenceStatus::EnAttente => absences.en_attente += heures,
        }
    }

    Bulletin {
        eleve_id,
        eleve: input.eleve.data.nom_complet(),
        matricule: input.eleve.data.matricule.clone(),
        semestre_id,
        semestre: input.semestre.data.libelle.clone(),
        lignes,
        moyenne_generale,
        mention: band.map(|band| band.libelle.clone()),
        couleur: band.map(|band| band.couleur.clone()),
        absences,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EvaluationType, Sexe};
    use anyhow::Result;
    use chrono::NaiveDate;

    fn date(value: &str) -> Result<NaiveDate> {
        Ok(NaiveDate::parse_from_str(value, "%Y-%m-%d")?)
    }

    #[test]
    fn mention_from_average_uses_band_edges() {
        assert_eq!(Mention::from_average(20.0), Mention::Excellent);
        assert_eq!(Mention::from_average(16.0), Mention::Excellent);
        assert_eq!(Mention::from_average(15.99), Mention::TresBien);
        assert_eq!(Mention::from_average(12.0), Mention::Bien);
        assert_eq!(Mention::from_average(10.0), Mention::AssezBien);
        assert_eq!(Mention::from_average(9.99), Mention::Insuffisant);
        assert_eq!(Mention::from_average(0.0), Mention::Insuffisant);
    }

    #[test]
    fn default_scale_matches_builtin_mentions() {
        let scale = MentionScale::default();
        for (average, mention) in [(18.5, Mention::Excellent), (13.0, Mention::Bien), (4.0, Mention::Insuffisant)] {
            let band = scale.classify(average);
            assert_eq!(band.map(|band| band.libelle.as_str()), Some(mention.label()));
        }
    }

    #[test]
    fn configured_bands_replace_builtin_scale() {
        let scale = MentionScale::from_configured(vec![
            MentionBand {
                libelle: "Admis".to_string(),
                note_min: 10.0,
                note_max: 20.0,
                couleur: "#00ff00".to_string(),
            },
            MentionBand {
                libelle: "Ajourné".to_string(),
                note_min: 0.0,
                note_max: 10.0,
                couleur: "#ff0000".to_string(),
            },
        ]);
        assert_eq!(scale.classify(20.0).map(|b| b.libelle.as_str()), Some("Admis"));
        assert_eq!(scale.classify(9.5).map(|b| b.libelle.as_str()), Some("Ajourné"));
    }

    #[test]
    fn weighted_average_handles_empty_input() {
        assert_eq!(weighted_average(Vec::new()), None);
        assert_eq!(weighted_average(vec![(12.0, 1.0), (15.0, 2.0)]), Some(14.0));
    }

    #[test]
    fn legacy_motif_shim() {
        assert_eq!(AbsenceStatus::from_legacy_motif(""), AbsenceStatus::EnAttente);
        assert_eq!(
            AbsenceStatus::from_legacy_motif("Absence NON JUSTIFIÉE"),
            AbsenceStatus::NonJustifiee
        );
        assert_eq!(
            AbsenceStatus::from_legacy_motif("Certificat médical"),
            AbsenceStatus::Justifiee
        );
        assert_eq!(
            AbsenceStatus::from_legacy_motif("justifiée par les parents"),
            AbsenceStatus::Justifiee
        );
        assert_eq!(
            AbsenceStatus::from_legacy_motif("retard bus"),
            AbsenceStatus::EnAttente
        );
    }

    #[test]
    fn bulletin_weights_exams_and_coefficients() -> Result<()> {
        let eleve = Record {
            id: 1,
            data: Eleve {
                matricule: "E-001".to_string(),
                nom: "Diallo".to_string(),
                prenom: "Awa".to_string(),
                date_naissance: date("2010-03-14")?,
                sexe: Sexe::Feminin,
                email: None,
                parent_id: None,
            },
        };
        let semestre = Record {
            id: 4,
            data: Semestre {
                libelle: "Semestre 1".to_string(),
                annee_scolaire_id: 1,
                date_debut: date("2024-09-01")?,
                date_fin: date("2025-01-31")?,
            },
        };
        let matiere = |id: i64, code: &str, coefficient: f64| Record {
            id,
            data: Matiere {
                code: code.to_string(),
                libelle: code.to_string(),
                coefficient,
                ue_id: None,
            },
        };
        let matieres = vec![matiere(10, "MATH", 3.0), matiere(11, "HIST", 1.0), matiere(12, "EPS", 1.0)];
        let note = |id: i64, matiere_id: i64, valeur: f64, type_evaluation| Record {
            id,
            data: Note {
                eleve_id: 1,
                matiere_id,
                semestre_id: 4,
                valeur,
                type_evaluation,
                commentaire: None,
            },
        };
        let mut notes = vec![
            note(1, 10, 12.0, EvaluationType::Devoir),
            note(2, 10, 15.0, EvaluationType::Examen),
            note(3, 11, 8.0, EvaluationType::Devoir),
        ];
        // Another semester and another student are ignored.
        let mut other = note(4, 10, 0.0, EvaluationType::Examen);
        other.data.semestre_id = 5;
        notes.push(other);
        let mut foreign = note(5, 11, 20.0, EvaluationType::Examen);
        foreign.data.eleve_id = 2;
        notes.push(foreign);

        let absence = |id: i64, day: &str, heures: i32, statut| -> Result<Record<Absence>> {
            Ok(Record {
                id,
                data: Absence {
                    eleve_id: 1,
                    date: date(day)?,
                    heures,
                    motif: None,
                    statut,
                },
            })
        };
        let absences = vec![
            absence(1, "2024-10-01", 2, AbsenceStatus::Justifiee)?,
            absence(2, "2024-11-12", 3, AbsenceStatus::NonJustifiee)?,
            absence(3, "2025-03-01", 4, AbsenceStatus::EnAttente)?,
        ];

        let scale = MentionScale::default();
        let bulletin = build_bulletin(&BulletinInput {
            eleve: &eleve,
            semestre: &semestre,
            matieres: &matieres,
            notes: &notes,
            absences: &absences,
            scale: &scale,
        });

        assert_eq!(bulletin.eleve, "Awa Diallo");
        assert_eq!(bulletin.lignes.len(), 2);
        assert_eq!(bulletin.lignes[0].moyenne, Some(14.0));
        assert_eq!(bulletin.lignes[0].mention.as_deref(), Some("Très bien"));
        assert_eq!(bulletin.lignes[1].moyenne, Some(8.0));
        // (14 * 3 + 8 * 1) / 4
        assert_eq!(bulletin.moyenne_generale, Some(12.5));
        assert_eq!(bulletin.mention.as_deref(), Some("Bien"));
        assert_eq!(bulletin.absences.total_heures, 5);
        assert_eq!(bulletin.absences.justifiees, 2);
        assert_eq!(bulletin.absences.non_justifiees, 3);
        assert_eq!(bulletin.absences.en_attente, 0);
        Ok(())
    }
}
