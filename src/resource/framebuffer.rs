//! Offscreen render targets.

use crate::context::{
    AttachmentKind, ClearFlags, FramebufferId, GraphicsContext, TextureDescriptor, TextureId,
    TextureUsage,
};
use crate::error::Result;
use crate::resource::Texture;

/// A framebuffer with a color texture and an optional depth and/or stencil attachment.
#[derive(Debug)]
pub struct Framebuffer {
    width: u32,
    height: u32,
    depth_stencil: Option<AttachmentKind>,
    id: Option<FramebufferId>,
    color: Texture,
    depth_texture: Option<TextureId>,
}

impl Framebuffer {
    /// Describes a `width x height` framebuffer. Nothing is allocated until [`Framebuffer::create`].
    ///
    /// `depth_stencil` must be `Depth`, `Stencil` or `DepthStencil`; a `Color` value is
    /// treated as no extra attachment.
    pub fn new(width: u32, height: u32, depth_stencil: Option<AttachmentKind>) -> Self {
        let depth_stencil = depth_stencil.filter(|kind| *kind != AttachmentKind::Color);
        Framebuffer {
            width,
            height,
            depth_stencil,
            id: None,
            color: Texture::render_target(width, height),
            depth_texture: None,
        }
    }

    /// Allocates the framebuffer and its attachments.
    pub fn create(&mut self, ctx: &mut GraphicsContext) -> Result<()> {
        if self.id.is_some() {
            return Ok(());
        }

        let id = ctx.create_framebuffer(self.width, self.height)?;
        self.color.allocate(ctx)?;
        if let Some(color) = self.color.id() {
            ctx.attach(id, AttachmentKind::Color, color)?;
        }

        if let Some(kind) = self.depth_stencil {
            let usage = if kind == AttachmentKind::Depth {
                TextureUsage::Depth
            } else {
                TextureUsage::DepthStencil
            };
            let desc = TextureDescriptor {
                usage,
                ..self.color.descriptor()
            };
            let texture = ctx.create_texture(&desc, &[])?;
            ctx.attach(id, kind, texture)?;
            self.depth_texture = Some(texture);
        }

        log::debug!(
            "Created {}x{} framebuffer {:?} with {:?}.",
            self.width,
            self.height,
            id,
            self.depth_stencil
        );
        self.id = Some(id);
        Ok(())
    }

    pub fn id(&self) -> Option<FramebufferId> {
        self.id
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// The texture the color output lands in.
    pub fn color_texture(&self) -> &Texture {
        &self.color
    }

    /// The planes a clear of this framebuffer must touch.
    pub fn bitplane(&self) -> ClearFlags {
        let mut flags = ClearFlags::COLOR;
        match self.depth_stencil {
            Some(AttachmentKind::Depth) => flags |= ClearFlags::DEPTH,
            Some(AttachmentKind::Stencil) => flags |= ClearFlags::STENCIL,
            Some(AttachmentKind::DepthStencil) => flags |= ClearFlags::DEPTH | ClearFlags::STENCIL,
            Some(AttachmentKind::Color) | None => {}
        }
        flags
    }

    /// Frees the framebuffer and its attachments.
    pub fn release(&mut self, ctx: &mut GraphicsContext) {
        if let Some(id) = self.id.take() {
            ctx.delete_framebuffer(id);
        }
        if let Some(texture) = self.depth_texture.take() {
            ctx.delete_texture(texture);
        }
        self.color.release(ctx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::HeadlessDevice;

    #[test]
    fn bitplane_follows_the_attachments() {
        assert_eq!(Framebuffer::new(4, 4, None).bitplane(), ClearFlags::COLOR);
        assert_eq!(
            Framebuffer::new(4, 4, Some(AttachmentKind::Depth)).bitplane(),
            ClearFlags::COLOR | ClearFlags::DEPTH
        );
        assert_eq!(
            Framebuffer::new(4, 4, Some(AttachmentKind::DepthStencil)).bitplane(),
            ClearFlags::all()
        );
    }

    #[test]
    fn create_attaches_color_and_depth() {
        let mut ctx = GraphicsContext::headless();
        let mut framebuffer = Framebuffer::new(8, 6, Some(AttachmentKind::Depth));
        framebuffer.create(&mut ctx).unwrap();

        let id = framebuffer.id().unwrap();
        let device = ctx.downcast_device::<HeadlessDevice>().unwrap();
        let kinds: Vec<_> = device.attachments(id).iter().map(|(k, _)| *k).collect();
        assert_eq!(kinds, vec![AttachmentKind::Color, AttachmentKind::Depth]);
        assert_eq!(ctx.bound_framebuffer(), None);
    }

    #[test]
    fn release_frees_everything() {
        let mut ctx = GraphicsContext::headless();
        let mut framebuffer = Framebuffer::new(8, 6, Some(AttachmentKind::DepthStencil));
        framebuffer.create(&mut ctx).unwrap();
        framebuffer.release(&mut ctx);

        let device = ctx.downcast_device::<HeadlessDevice>().unwrap();
        assert_eq!(device.live_framebuffers(), 0);
        assert_eq!(device.live_textures(), 0);
    }
}
