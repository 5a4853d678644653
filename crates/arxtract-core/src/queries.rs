use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// A few-shot example shown to the generation model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Example {
    pub input: String,
    pub output: String,
}

/// Declarative prompt description. The final prompt text is produced by
/// [`Prompt::build`], which appends the retrieved context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prompt {
    pub expert: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_field_expertise: Option<String>,
    pub main_instruction: String,
    #[serde(default)]
    pub secondary_instructions: Vec<String>,
    #[serde(default)]
    pub constraints: Vec<String>,
    #[serde(default)]
    pub examples: Vec<Example>,
}

impl Prompt {
    /// Format the prompt and append `text` as the context block.
    pub fn build(&self, text: &str) -> String {
        let mut lines: Vec<String> = Vec::new();

        let mut expert_line = format!("You are a {} assistant", self.expert);
        if let Some(sub_field) = &self.sub_field_expertise {
            expert_line = format!("{expert_line} with expertise in {sub_field}.");
        }
        lines.push(expert_line);

        let mut instruction_lines = format!(
            "Given the following scientific text, your task is: {}",
            self.main_instruction
        );
        if !self.secondary_instructions.is_empty() {
            instruction_lines =
                format!("{instruction_lines}.\nAdditionally, you also need to follow these instructions:");
            for instruction in &self.secondary_instructions {
                instruction_lines = format!("{instruction_lines}\n{instruction}");
            }
        }
        lines.push(instruction_lines);

        if !self.constraints.is_empty() {
            let mut constraint_lines =
                "Important constraints when generating the output:".to_string();
            for constraint in &self.constraints {
                constraint_lines = format!("{constraint_lines}\n- {constraint}");
            }
            lines.push(constraint_lines);
        }

        if !self.examples.is_empty() {
            let mut example_lines = "Examples of how to answer the prompt:".to_string();
            for (i, example) in self.examples.iter().enumerate() {
                example_lines = format!(
                    "{example_lines}\nExample {i}:\n- Input text: {}\n  Answer: {}",
                    example.input, example.output
                );
            }
            lines.push(example_lines);
        }

        lines.push(format!("\nText:\n{text}"));
        lines.join("\n")
    }
}

/// A named pair of retrieval query and prompt template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryEntry {
    pub retriever_query: String,
    pub prompt: Prompt,
}

/// Read-only registry of named queries, built once at process start and
/// passed by reference into the pipeline. Never mutated after load.
#[derive(Debug, Clone)]
pub struct QueryRegistry {
    entries: BTreeMap<String, QueryEntry>,
}

impl QueryRegistry {
    /// The built-in set of queries.
    pub fn builtin() -> Self {
        let mut entries = BTreeMap::new();

        entries.insert(
            "material_formula".to_string(),
            QueryEntry {
                retriever_query: "Identify all mentions of the system being simulated. The system can be a bulk \
                     crystal, a molecule, a nanostructure, and in general, any material. It can also \
                     be a toy model such as the square lattice, the triangular lattice, or the \
                     honeycomb lattice (to name a few)."
                    .to_string(),
                prompt: Prompt {
                    expert: "Condensed Matter Physics".to_string(),
                    sub_field_expertise: None,
                    main_instruction: "identify all mentions of the system being simulated"
                        .to_string(),
                    secondary_instructions: vec![
                        "Look for mentions of chemical formulas, specific names of models (like 'square lattice' or 'honeycomb lattice'), or any other indication that the system is a real material or a model.".to_string(),
                        "Only consider if the mention of a real material corresponds to an actual simulation of that material.".to_string(),
                        "Ignore mentions of similar materials, or whether the material is used as a reference or comparison.".to_string(),
                    ],
                    constraints: vec![
                        "Only return the strings asked for, without any additional text, explanation, or thinking block.".to_string(),
                    ],
                    examples: vec![
                        Example {
                            input: "The system is a bulk crystal of silicon, which has a diamond cubic structure.".to_string(),
                            output: "Si2".to_string(),
                        },
                        Example {
                            input: "The square lattice model is used to simulate the behavior of electrons in a simplified system.".to_string(),
                            output: "model".to_string(),
                        },
                        Example {
                            input: "We study the electronic properties of graphene, a two-dimensional material with a honeycomb lattice structure.".to_string(),
                            output: "graphene | C".to_string(),
                        },
                        Example {
                            input: "We study the material Fe2O3 and its doped variant Fe2O3.25.".to_string(),
                            output: "Fe2O3, Fe2O3.25".to_string(),
                        },
                        Example {
                            input: "We study SrVO3, a system who is similar to SrTiO3 but with a different electronic structure.".to_string(),
                            output: "SrVO3".to_string(),
                        },
                    ],
                },
            },
        );

        entries.insert(
            "scientific_methods".to_string(),
            QueryEntry {
                retriever_query: "Identify all mentions of scientific methods used in this text, especially those \
                     relevant to Condensed Matter Physics. Look for full names (e.g., Density \
                     Functional Theory, Quantum Monte Carlo, Wannierization) and abbreviations \
                     (e.g., DFT, QMC, DMFT, ARPES). Include any experimental, computational, or \
                     numerical techniques."
                    .to_string(),
                prompt: Prompt {
                    expert: "Condensed Matter Physics".to_string(),
                    sub_field_expertise: Some("many-body physics simulations".to_string()),
                    main_instruction:
                        "identify all scientific methods actually used in the simulations described"
                            .to_string(),
                    secondary_instructions: vec![
                        "Report both full names and abbreviations when present.".to_string(),
                        "Ignore methods that are only cited for comparison with other works.".to_string(),
                    ],
                    constraints: vec![
                        "Only return a comma-separated list of method names, without any additional text, explanation, or thinking block.".to_string(),
                    ],
                    examples: vec![
                        Example {
                            input: "We combine density functional theory (DFT) with dynamical mean-field theory (DMFT) to study the spectral function.".to_string(),
                            output: "DFT, DMFT".to_string(),
                        },
                        Example {
                            input: "Angle-resolved photoemission spectroscopy confirms the calculated band structure.".to_string(),
                            output: "ARPES".to_string(),
                        },
                    ],
                },
            },
        );

        entries.insert(
            "dft_params".to_string(),
            QueryEntry {
                retriever_query: "Identify all mentions of the DFT (Density Functional Theory) parameters and \
                     program being used."
                    .to_string(),
                prompt: Prompt {
                    expert: "Condensed Matter Physics".to_string(),
                    sub_field_expertise: Some("Density Functional Theory simulations".to_string()),
                    main_instruction:
                        "extract the DFT program and numerical parameters used in the simulations"
                            .to_string(),
                    secondary_instructions: vec![
                        "Target fields: program_name, program_version, k_mesh, exchange_correlation_functional, basis_set, planewave_cutoff_energy, planewave_cutoff_energy_units, rkmax.".to_string(),
                        "Ignore mentions of parameters used in other simulations, only return the ones actually used in this text.".to_string(),
                    ],
                    constraints: vec![
                        "Return the data as a JSON object, without any additional text, explanation, or thinking block.".to_string(),
                        "If one of the target fields is not specified or you cannot extract it from the text, do not hallucinate and do not return it.".to_string(),
                    ],
                    examples: vec![
                        Example {
                            input: "We used the Quantum ESPRESSO package for our DFT simulations. We adopted the local density approximation (LDA). The plane wave cutoff energy was set to 30 Ry.".to_string(),
                            output: "{\"program_name\": \"Quantum ESPRESSO\", \"exchange_correlation_functional\": \"LDA\", \"basis_set\": \"plane waves\", \"planewave_cutoff_energy\": 30, \"planewave_cutoff_energy_units\": \"Ry\"}".to_string(),
                        },
                    ],
                },
            },
        );

        Self { entries }
    }

    /// Look up an entry, producing the fatal config error listing the valid
    /// names when the query is unknown.
    pub fn get(&self, name: &str) -> Result<&QueryEntry> {
        self.entries
            .get(name)
            .ok_or_else(|| CoreError::UnknownQuery {
                name: name.to_string(),
                available: self.names(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registry_has_expected_names() {
        let registry = QueryRegistry::builtin();
        assert!(registry.contains("material_formula"));
        assert!(registry.contains("scientific_methods"));
        assert!(registry.contains("dft_params"));
    }

    #[test]
    fn unknown_query_lists_available_names() {
        let registry = QueryRegistry::builtin();
        let err = registry.get("nope").unwrap_err();
        match err {
            CoreError::UnknownQuery { name, available } => {
                assert_eq!(name, "nope");
                assert!(available.contains(&"material_formula".to_string()));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn prompt_build_appends_text_last() {
        let registry = QueryRegistry::builtin();
        let entry = registry.get("material_formula").unwrap();
        let built = entry.prompt.build("We simulate SrVO3.");
        assert!(built.starts_with("You are a Condensed Matter Physics assistant"));
        assert!(built.ends_with("\nText:\nWe simulate SrVO3."));
        assert!(built.contains("Examples of how to answer the prompt:"));
    }

    #[test]
    fn prompt_build_skips_empty_sections() {
        let prompt = Prompt {
            expert: "Physics".to_string(),
            sub_field_expertise: None,
            main_instruction: "do the thing".to_string(),
            secondary_instructions: vec![],
            constraints: vec![],
            examples: vec![],
        };
        let built = prompt.build("ctx");
        assert!(!built.contains("Important constraints"));
        assert!(!built.contains("Examples of how to answer"));
    }
}
