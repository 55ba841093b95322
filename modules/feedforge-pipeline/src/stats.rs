/// Stats from one orchestrator run.
#[derive(Debug, Default)]
pub struct RunStats {
    pub items_acquired: u32,
    pub items_enriched: u32,
    pub items_not_novel: u32,
    pub items_summarized: u32,
    pub redo_enrich: u32,
    pub redo_summarize: u32,
    pub forced_forward: u32,
    pub duplicates_intra_batch: u32,
    pub duplicates_cross_history: u32,
    pub incomplete_excluded: u32,
    pub groups_formed: u32,
    pub narratives_synthesized: u32,
    pub items_published: u32,
    pub items_pruned: u64,
}

impl std::fmt::Display for RunStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\n=== Pipeline Run Complete ===")?;
        writeln!(f, "Items acquired:     {}", self.items_acquired)?;
        writeln!(f, "Items enriched:     {}", self.items_enriched)?;
        writeln!(f, "Not novel:          {}", self.items_not_novel)?;
        writeln!(f, "Items summarized:   {}", self.items_summarized)?;
        writeln!(f, "Redo → enrich:      {}", self.redo_enrich)?;
        writeln!(f, "Redo → summarize:   {}", self.redo_summarize)?;
        writeln!(f, "Forced forward:     {}", self.forced_forward)?;
        writeln!(f, "Dupes (batch):      {}", self.duplicates_intra_batch)?;
        writeln!(f, "Dupes (history):    {}", self.duplicates_cross_history)?;
        writeln!(f, "Incomplete dropped: {}", self.incomplete_excluded)?;
        writeln!(f, "Groups formed:      {}", self.groups_formed)?;
        writeln!(f, "Narratives:         {}", self.narratives_synthesized)?;
        writeln!(f, "Items published:    {}", self.items_published)?;
        writeln!(f, "Items pruned:       {}", self.items_pruned)?;
        Ok(())
    }
}
